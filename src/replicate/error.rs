//! Tipos de erro para o cliente da API Replicate.
//!
//! Define [`ReplicateError`] com variantes para respostas HTTP sem sucesso,
//! respostas fora do contrato e erros de rede. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com a API da Replicate.
///
/// - [`Unavailable`](ReplicateError::Unavailable): o provedor respondeu com status HTTP de erro
/// - [`Protocol`](ReplicateError::Protocol): a resposta não segue o contrato esperado
/// - [`Network`](ReplicateError::Network): falha na camada de rede
#[derive(Debug, Error)]
pub enum ReplicateError {
    /// O provedor não reconheceu a requisição (4xx/5xx).
    /// O corpo da resposta fica em `message` apenas para diagnóstico e não
    /// entra no `Display`, que chega ao cliente final.
    #[error("provider returned status {status}")]
    Unavailable { status: u16, message: String },

    /// A resposta chegou, mas sem os campos de que dependemos
    /// (por exemplo, a URL de consulta de status).
    #[error("unexpected provider response: {0}")]
    Protocol(String),

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
