//! Interface de terminal do extrator: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`BatchProgress`] mantém um spinner por arquivo
//! e imprime cada resultado assim que o job termina, na ordem de conclusão.

use std::collections::HashMap;

use console::Style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde_json::Value;

use extrator::state_machine::display_name;
use extrator::{CompletedJob, ProcessingResult};

/// Spinners de um lote de jobs, indexados pelo id do job.
pub struct BatchProgress {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    // Verde para sucesso, vermelho para erro, amarelo para avisos.
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Inicia o spinner de um job recém-submetido.
    pub fn start(&mut self, job_id: &str, file_name: &str, mime_type: &str) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        let icon = if mime_type.starts_with("image/") { "🖼️" } else { "📄" };
        pb.set_message(format!("{icon} {file_name}: processando..."));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        self.bars.insert(job_id.to_string(), pb);
    }

    /// Aviso para arquivos recusados antes da submissão.
    pub fn rejected(&self, message: &str) {
        let _ = self
            .multi
            .println(format!("  {} {message}", self.yellow.apply_to("⚠")));
    }

    /// Finaliza o spinner do job e imprime o resultado.
    pub fn complete(&mut self, done: &CompletedJob) {
        if let Some(pb) = self.bars.remove(&done.job_id) {
            pb.finish_and_clear();
        }
        let _ = self.multi.println(self.render(done));
    }

    fn render(&self, done: &CompletedJob) -> String {
        let name = display_name(&done.file_path);
        let result = &done.result;

        let mut out = if result.is_success() {
            let method = result.processing_method().unwrap_or("Processamento");
            format!("  {} {name}: Concluído ({method})", self.green.apply_to("✓"))
        } else {
            format!(
                "  {} {name}: {}",
                self.red.apply_to("✗"),
                result.message().unwrap_or("Erro no processamento")
            )
        };

        render_details(result, &self.dim, &mut out);
        out
    }
}

fn render_details(result: &ProcessingResult, dim: &Style, out: &mut String) {
    if let Some(doc_type) = result.doc_type() {
        out.push_str(&format!("\n      Tipo: {doc_type}"));
    }
    if let Some(data) = result.data() {
        for (key, value) in data {
            render_field(key, value, 3, out);
        }
    }
    if let Some(pages) = result.pages() {
        out.push_str(&format!("\n      {}", dim.apply_to(format!("páginas: {pages}"))));
    }
    if let Some(at) = result.processed_at() {
        out.push_str(&format!("\n      {}", dim.apply_to(format!("processado em: {at}"))));
    }
    if let Some(raw) = result.raw() {
        let preview: String = raw.chars().take(200).collect();
        out.push_str(&format!("\n      {}", dim.apply_to(format!("saída bruta: {preview}"))));
    }
}

// Objetos aninhados viram blocos indentados; o resto é impresso como texto.
fn render_field(key: &str, value: &Value, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            out.push_str(&format!("\n{indent}{key}:"));
            for (k, v) in map {
                render_field(k, v, depth + 1, out);
            }
        }
        Value::String(s) => out.push_str(&format!("\n{indent}{key}: {s}")),
        Value::Null => out.push_str(&format!("\n{indent}{key}: -")),
        other => out.push_str(&format!("\n{indent}{key}: {other}")),
    }
}
