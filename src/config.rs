//! Configuração do extrator carregada a partir de `extrator.toml`.
//!
//! A struct [`ExtratorConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `EXTRATOR_ANALYZERS_DIR` tem precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::analyzer::AnalyzerTable;
use crate::error::ExtratorError;
use crate::fetch::FetchSettings;
use crate::orchestrator::JobLimits;

/// Arquivo lido quando nenhum caminho é informado.
pub const DEFAULT_CONFIG_FILE: &str = "extrator.toml";

/// Variável de ambiente que sobrescreve `analyzers_dir`.
pub const ANALYZERS_DIR_ENV: &str = "EXTRATOR_ANALYZERS_DIR";

/// Configuração de nível superior carregada de `extrator.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtratorConfig {
    /// Interpretador usado para rodar os analisadores. Vazio executa direto.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Analisador de documentos (PDF e tipos desconhecidos).
    #[serde(default = "default_document_analyzer")]
    pub document_analyzer: PathBuf,

    /// Analisador de imagens (`image/*`).
    #[serde(default = "default_image_analyzer")]
    pub image_analyzer: PathBuf,

    /// Diretório base para caminhos relativos dos analisadores.
    #[serde(default)]
    pub analyzers_dir: Option<PathBuf>,

    /// Prazo por job, em segundos, antes de encerrar o analisador.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Teto de captura da saída padrão, em bytes.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Máximo de analisadores rodando ao mesmo tempo.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Tipos MIME aceitos pela interface antes de submeter um arquivo.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,

    /// Desliga a verificação de certificados TLS na busca de dados. Inseguro.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Prazo total de uma busca de dados, em segundos.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

// Valor padrão para o interpretador: "python".
fn default_interpreter() -> String {
    "python".to_string()
}

fn default_document_analyzer() -> PathBuf {
    PathBuf::from("document_processor.py")
}

fn default_image_analyzer() -> PathBuf {
    PathBuf::from("image_processor.py")
}

// Valor padrão para o prazo: 60s.
fn default_timeout_secs() -> u64 {
    60
}

// Valor padrão para o teto de saída: 20 MiB.
fn default_max_output_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_allowed_types() -> Vec<String> {
    ["application/pdf", "image/jpeg", "image/jpg", "image/png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for ExtratorConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            document_analyzer: default_document_analyzer(),
            image_analyzer: default_image_analyzer(),
            analyzers_dir: None,
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            allowed_types: default_allowed_types(),
            accept_invalid_certs: false,
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl ExtratorConfig {
    /// Carrega a configuração de `path`, ou de `extrator.toml` no diretório atual.
    ///
    /// Sem caminho explícito, a ausência do arquivo resulta nos valores padrão;
    /// com caminho explícito, o arquivo precisa existir.
    pub fn load(path: Option<&Path>) -> Result<Self, ExtratorError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração.
        if let Some(dir) = std::env::var_os(ANALYZERS_DIR_ENV).filter(|d| !d.is_empty()) {
            config.analyzers_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ExtratorError> {
        debug!(path = %path.display(), "loading configuration");
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<ExtratorConfig>(&contents)?)
    }

    /// Rejeita limites que tornariam o processamento impossível.
    pub fn validate(&self) -> Result<(), ExtratorError> {
        if self.timeout_secs == 0 {
            return Err(ExtratorError::Config("timeout_secs must be greater than zero".into()));
        }
        if self.max_output_bytes == 0 {
            return Err(ExtratorError::Config("max_output_bytes must be greater than zero".into()));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(ExtratorError::Config("max_concurrent_jobs must be greater than zero".into()));
        }
        if self.max_concurrent_jobs > Semaphore::MAX_PERMITS {
            return Err(ExtratorError::Config(format!(
                "max_concurrent_jobs must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(())
    }

    /// Tabela de resolução com caminhos relativos ancorados em `analyzers_dir`.
    pub fn analyzer_table(&self) -> AnalyzerTable {
        let table = AnalyzerTable::new(
            self.resolve_analyzer(&self.document_analyzer),
            self.resolve_analyzer(&self.image_analyzer),
        );
        if self.interpreter.trim().is_empty() {
            table
        } else {
            table.with_interpreter(self.interpreter.trim())
        }
    }

    fn resolve_analyzer(&self, path: &Path) -> PathBuf {
        match &self.analyzers_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn job_limits(&self) -> JobLimits {
        JobLimits {
            deadline: Duration::from_secs(self.timeout_secs),
            max_output_bytes: self.max_output_bytes,
            max_concurrent_jobs: self.max_concurrent_jobs,
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            accept_invalid_certs: self.accept_invalid_certs,
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            ..FetchSettings::default()
        }
    }

    /// Se a interface deve aceitar um arquivo com este tipo declarado.
    pub fn is_allowed_type(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }
}
