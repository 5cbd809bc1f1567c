//! Tipos de dados para requisições e respostas da API de predições da Replicate.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON
//! conforme o formato esperado pelo endpoint `v1/predictions`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Versão fixa do modelo ControlNet (hough) usado para redesenhar cômodos.
pub const MODEL_VERSION: &str = "854e8727697a057c525cdb45ab037f64ecca770a1769cc52287c2e56472a247b";

/// Diretiva de qualidade enviada junto com todo prompt.
pub const QUALITY_PROMPT: &str = "best quality, extremely detailed, photo from Pinterest, interior, cinematic photo, ultra-detailed, ultra-realistic, award-winning";

/// Diretiva negativa enviada junto com todo prompt.
pub const NEGATIVE_PROMPT: &str = "longbody, lowres, bad anatomy, bad hands, missing fingers, extra digit, fewer digits, cropped, worst quality, low quality";

/// Corpo da requisição para criar uma predição.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Identificador da versão do modelo.
    pub version: String,
    /// Parâmetros de entrada do modelo.
    pub input: PredictionInput,
}

impl PredictionRequest {
    /// Monta a requisição com a versão fixa e as diretivas constantes.
    /// Apenas a imagem e o prompt variam entre chamadas.
    pub fn new(image: &str, prompt: &str) -> Self {
        Self {
            version: MODEL_VERSION.to_string(),
            input: PredictionInput {
                image: image.to_string(),
                prompt: prompt.to_string(),
                a_prompt: QUALITY_PROMPT.to_string(),
                n_prompt: NEGATIVE_PROMPT.to_string(),
            },
        }
    }
}

/// Entrada do modelo ControlNet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionInput {
    /// URL da imagem original do cômodo.
    pub image: String,
    /// Prompt gerado a partir do tema e do tipo de cômodo.
    pub prompt: String,
    /// Diretiva de qualidade ("added prompt").
    pub a_prompt: String,
    /// Diretiva negativa ("negative prompt").
    pub n_prompt: String,
}

/// Resposta da API tanto para a criação quanto para a consulta de uma predição.
///
/// A Replicate devolve o mesmo formato nos dois endpoints; campos ausentes
/// viram `None` em vez de falhar a desserialização.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Identificador da predição.
    #[serde(default)]
    pub id: Option<String>,
    /// Status bruto: "starting", "processing", "succeeded", "failed" ou "canceled".
    #[serde(default)]
    pub status: String,
    /// Saída do modelo: uma URL ou uma lista de URLs.
    #[serde(default)]
    pub output: Option<Value>,
    /// Mensagem de erro reportada pelo provedor, se houver.
    #[serde(default)]
    pub error: Option<String>,
    /// Links de acompanhamento da predição.
    #[serde(default)]
    pub urls: Option<PredictionUrls>,
}

/// Links retornados pela Replicate para uma predição.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionUrls {
    /// URL de consulta de status.
    #[serde(default)]
    pub get: Option<String>,
    /// URL de cancelamento.
    #[serde(default)]
    pub cancel: Option<String>,
}

impl PredictionResponse {
    /// URL de consulta de status, se presente e não vazia.
    pub fn status_url(&self) -> Option<&str> {
        self.urls
            .as_ref()
            .and_then(|u| u.get.as_deref())
            .filter(|u| !u.is_empty())
    }

    /// URL da imagem resultante.
    ///
    /// O modelo devolve `[mapa_de_bordas, resultado]`; o resultado é sempre
    /// a última string da lista. Uma string simples também é aceita.
    pub fn output_url(&self) -> Option<String> {
        let url = match self.output.as_ref()? {
            Value::String(s) => Some(s.as_str()),
            Value::Array(items) => items.iter().rev().find_map(Value::as_str),
            _ => None,
        };
        url.filter(|s| !s.is_empty()).map(str::to_string)
    }
}
