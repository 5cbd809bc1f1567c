//! Interface de linha de comando do roomify baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (serve, generate)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// roomify: redesenha fotos de cômodos com um tema via Replicate.
#[derive(Debug, Parser)]
#[command(name = "roomify", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: roomify.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Aumenta o nível de log (-v, -vv, -vvv).
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sobe o servidor HTTP com o endpoint POST /generate.
    Serve {
        /// Porta HTTP (sobrescreve a configuração).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Executa uma única geração e imprime a URL da imagem resultante.
    Generate {
        /// URL da foto original do cômodo.
        image_url: String,

        /// Tema do redesenho (ex.: Modern, Vintage, Tropical).
        #[arg(long)]
        theme: String,

        /// Tipo de cômodo (ex.: "Living Room", "Gaming Room").
        #[arg(long)]
        room: String,
    },
}
