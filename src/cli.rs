//! Interface de linha de comando do extrator baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (process, fetch, analyzers)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Extrator: análise de documentos e imagens por analisadores externos.
#[derive(Debug, Parser)]
#[command(name = "extrator", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./extrator.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Processa um ou mais arquivos concorrentemente.
    Process {
        /// Arquivos a analisar.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tipo MIME declarado para todos os arquivos (padrão: inferido pela extensão).
        #[arg(long)]
        mime: Option<String>,

        /// Aceita tipos fora da lista `allowed_types`.
        #[arg(long, default_value_t = false)]
        any_type: bool,

        /// Prazo por arquivo, em segundos.
        #[arg(long)]
        timeout: Option<u64>,

        /// Máximo de analisadores simultâneos.
        #[arg(long)]
        jobs: Option<usize>,

        /// Imprime uma linha JSON por job em vez do resumo colorido.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Busca uma URL pela ponte e imprime o corpo da resposta.
    Fetch {
        url: String,
    },

    /// Mostra a tabela de analisadores e os limites em vigor.
    Analyzers,
}
