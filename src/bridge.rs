//! Ponte entre a camada de apresentação e o núcleo.
//!
//! Expõe exatamente duas capacidades: submeter um arquivo para processamento e
//! buscar dados pela rede.

use std::path::PathBuf;

use crate::config::ExtratorConfig;
use crate::decoder::ProcessingResult;
use crate::fetch::{FetchError, FetchResponse, Fetcher};
use crate::orchestrator::JobOrchestrator;

#[derive(Debug, Clone)]
pub struct Bridge {
    orchestrator: JobOrchestrator,
    fetcher: Fetcher,
}

impl Bridge {
    pub fn new(orchestrator: JobOrchestrator, fetcher: Fetcher) -> Self {
        Self {
            orchestrator,
            fetcher,
        }
    }

    /// Monta a ponte a partir da configuração carregada na inicialização.
    pub fn from_config(config: &ExtratorConfig) -> Result<Self, FetchError> {
        let orchestrator = JobOrchestrator::new(config.analyzer_table(), config.job_limits());
        let fetcher = Fetcher::new(config.fetch_settings())?;
        Ok(Self::new(orchestrator, fetcher))
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    /// Processa um arquivo. Nunca falha: erros chegam como resultado.
    pub async fn process_file(
        &self,
        file_path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
    ) -> ProcessingResult {
        self.orchestrator.process(file_path, mime_type).await
    }

    pub async fn fetch_data(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.fetcher.fetch(url).await
    }
}
