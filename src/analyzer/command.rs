//! Seleção do analisador externo a partir do tipo MIME declarado.
//!
//! A [`AnalyzerTable`] é a tabela de resolução somente-leitura compartilhada
//! por todos os jobs. Tipos `image/*` vão para o analisador de imagens; todo o
//! resto (inclusive tipo vazio ou desconhecido) cai no analisador de documentos.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Qual dos dois analisadores externos atende um job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    /// PDFs e qualquer tipo não reconhecido.
    Document,
    /// Qualquer tipo com prefixo `image/`.
    Image,
}

impl AnalyzerKind {
    /// Roteia pelo prefixo do tipo MIME; não há caso de falha.
    pub fn for_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            AnalyzerKind::Image
        } else {
            AnalyzerKind::Document
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerKind::Document => write!(f, "document"),
            AnalyzerKind::Image => write!(f, "image"),
        }
    }
}

/// Tabela de resolução: caminhos dos analisadores e o interpretador opcional.
#[derive(Debug, Clone)]
pub struct AnalyzerTable {
    // Quando presente, vira o programa e o script passa a ser o primeiro argumento.
    interpreter: Option<PathBuf>,
    document: PathBuf,
    image: PathBuf,
}

impl AnalyzerTable {
    /// Cria uma tabela que executa os analisadores diretamente.
    pub fn new(document: impl Into<PathBuf>, image: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: None,
            document: document.into(),
            image: image.into(),
        }
    }

    /// Executa os analisadores através de um interpretador (ex.: `python`).
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn interpreter(&self) -> Option<&Path> {
        self.interpreter.as_deref()
    }

    /// Caminho do analisador para o tipo dado.
    pub fn executable(&self, kind: AnalyzerKind) -> &Path {
        match kind {
            AnalyzerKind::Document => &self.document,
            AnalyzerKind::Image => &self.image,
        }
    }

    /// Resolve o tipo MIME para o analisador e seu caminho.
    pub fn resolve(&self, mime_type: &str) -> (AnalyzerKind, &Path) {
        let kind = AnalyzerKind::for_mime(mime_type);
        (kind, self.executable(kind))
    }

    /// Monta a invocação completa para um arquivo.
    pub fn invocation(
        &self,
        mime_type: &str,
        file_path: &Path,
        max_output_bytes: usize,
    ) -> AnalyzerInvocation {
        let (kind, analyzer) = self.resolve(mime_type);
        let (program, mut args) = match &self.interpreter {
            Some(interpreter) => (interpreter.clone(), vec![analyzer.as_os_str().to_owned()]),
            None => (analyzer.to_path_buf(), Vec::new()),
        };
        args.push(file_path.as_os_str().to_owned());

        AnalyzerInvocation {
            kind,
            program,
            args,
            file_path: file_path.to_path_buf(),
            max_output_bytes,
        }
    }
}

/// Uma execução efêmera de analisador: programa, argv e teto de captura.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerInvocation {
    pub kind: AnalyzerKind,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub file_path: PathBuf,
    pub max_output_bytes: usize,
}

impl AnalyzerInvocation {
    /// Linha de comando legível, apenas para logs e mensagens de erro.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}
