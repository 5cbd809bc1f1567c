//! Interface de terminal do roomify: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`GenerationProgress`] acompanha visualmente
//! uma geração disparada pelo subcomando `generate`.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::GenerationError;
use crate::handler::GenerationResponse;

/// Indicador visual de progresso para uma geração no terminal.
///
/// Exibe um spinner animado enquanto o job é submetido e consultado, e
/// mensagens coloridas para sucesso (verde) e falha (vermelho).
pub struct GenerationProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para dicas de nova tentativa.
    yellow: Style,
}

impl GenerationProgress {
    /// Inicia o spinner com o prompt da geração.
    pub fn start(prompt: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("Generating: {prompt}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resultado.
    ///
    /// Sucesso mostra a URL da imagem em verde; falha mostra o tipo do erro
    /// em vermelho e, se fizer sentido repetir, uma dica em amarelo.
    pub fn finish(&self, result: &Result<GenerationResponse, GenerationError>) {
        self.pb.finish_and_clear();
        match result {
            Ok(resp) => {
                println!("  {} {}", self.green.apply_to("✓"), resp.image);
                if let Some(rl) = &resp.rate_limit {
                    println!("    {}/{} generations left", rl.remaining, rl.limit);
                }
            }
            Err(e) => {
                println!("  {} [{}] {e}", self.red.apply_to("✗"), e.kind());
                if e.is_retryable() {
                    println!("    {}", self.yellow.apply_to("↻ retrying later may succeed"));
                }
            }
        }
    }
}
