//! CLI: transformer sources → (schema document | sample view)
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::ast::base_name;
use crate::config::InferenceConfig;
use crate::inference::{InferenceResult, Inferer, TypeDescriptor};
use crate::names::TypeLookup;
use crate::registry::{Document, SchemaRegistry};
use crate::workspace::{TransformerSource, Workspace};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// infer response schemas from resource transformer classes, statically
#[derive(Parser, Debug)]
#[command(name = "resource-schema", version)]
pub struct CommandLineInterface {
    /// more logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// infer every transformer and print the components/responses document
    Schema(SchemaOut),
    /// print the inferred field list of one transformer
    Sample(SampleOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more source files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// JSON file overriding the recognized method and idiom names
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// only these classes (fully-qualified or short name); default: all
    #[arg(long = "class")]
    classes: Vec<String>,

    /// JQ post-process filter for the emitted document
    #[arg(long)]
    jq_expr: Option<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct SampleOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// class to inspect (fully-qualified or short name)
    #[arg(long = "class")]
    class: String,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load(&self) -> Result<(Workspace, InferenceConfig)> {
        let config = match &self.config {
            Some(path) => InferenceConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => InferenceConfig::default(),
        };
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let workspace = Workspace::load_files(&source_paths).context("failed to load sources")?;
        tracing::debug!(files = source_paths.len(), classes = workspace.len(), "sources loaded");
        Ok((workspace, config))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        init_tracing(self.verbose);
        match &self.cmd {
            Command::Schema(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let (workspace, config) = target.input_settings.load()?;
                let classes = if target.classes.is_empty() {
                    workspace
                        .transformers_with(&config.method)
                        .into_iter()
                        .map(|t| t.name.to_string())
                        .collect()
                } else {
                    select_classes(&workspace, &target.classes)?
                };

                let doc = build_document(&workspace, &config, &classes);
                let mut value = doc.to_json();
                if let Some(jq_expr) = target.jq_expr.as_ref() {
                    let mut outputs = crate::jq_exec::run_jaq(jq_expr, &value)
                        .context("failed to apply jq expression to the document")?;
                    value = match outputs.len() {
                        1 => outputs.remove(0),
                        _ => Value::Array(outputs),
                    };
                }
                let text = serde_json::to_string_pretty(&value)?;
                write_output(target.out.as_deref(), &text)
            }
            Command::Sample(target) => {
                let (workspace, config) = target.input_settings.load()?;
                let class = select_one(&workspace, &target.class)?;

                let mut registry = SchemaRegistry::new();
                let result = Inferer::new(&config, &workspace, &mut registry).sample(&class);
                let hint = workspace.transformer(&class).and_then(|t| t.model_hint(&workspace));

                println!("{}", class.bold());
                println!("model: {}", hint.as_deref().unwrap_or("-"));
                match result {
                    Some(result) => print!("{}", render_sample(&result)),
                    None => println!("{}", format!("no array literal returned from {}", config.method).yellow()),
                }
                for (name, _) in registry.iter() {
                    println!("nested schema: {name}");
                }
                Ok(())
            }
        }
    }
}

/// Infer each class into one document, reporting per class on stderr.
fn build_document(workspace: &Workspace, config: &InferenceConfig, classes: &[String]) -> Document {
    let mut doc = Document::new();
    let mut inferer = Inferer::new(config, workspace, &mut doc.components);
    for class in classes {
        match inferer.extract_response(class) {
            Some(response) => {
                let path = workspace.transformer(class).and_then(|t| t.path);
                eprintln!("{} {}", "✓".green(), summary_line(class, path));
                doc.responses.insert(class.clone(), response);
            }
            None => eprintln!("{} {class}: no inferable response", "✗".yellow()),
        }
    }
    eprintln!(
        "{} {} responses, {} schemas",
        "done:".bold(),
        doc.responses.len(),
        inferer.registry().len()
    );
    doc
}

fn summary_line(class: &str, path: Option<&Path>) -> String {
    let mut line = format!("{class} → {}", base_name(class).cyan());
    if let Some(path) = path {
        line.push_str(&format!(" ({})", path.display()).dimmed().to_string());
    }
    line
}

fn render_sample(result: &InferenceResult) -> String {
    let mut out = String::new();
    for field in &result.fields {
        let key = field.key.as_deref().unwrap_or("<unkeyed>");
        let flag = if field.required { "required" } else { "optional" };
        out.push_str(&format!("  {key}: {} ({flag})\n", describe(&field.ty)));
    }
    out
}

fn describe(ty: &TypeDescriptor) -> String {
    match ty {
        TypeDescriptor::StringLiteral => "string literal".into(),
        TypeDescriptor::ScalarUnknown => "scalar".into(),
        TypeDescriptor::SchemaReference(name) => format!("ref {name}"),
        TypeDescriptor::InlineObject(fields) => {
            let keys: Vec<_> = fields.iter().filter_map(|f| f.key.as_deref()).collect();
            format!("object {{{}}}", keys.join(", "))
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Fully-qualified names for user-supplied class filters.
///
/// A filter matches a class exactly (leading `\` optional) or by short name;
/// a short name may match several classes.
fn select_classes(workspace: &Workspace, filters: &[String]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for filter in filters {
        let wanted = filter.trim_start_matches('\\');
        if workspace.type_exists(wanted) {
            out.push(wanted.to_string());
            continue;
        }
        let matches: Vec<_> = workspace
            .class_names()
            .filter(|fq| base_name(fq) == wanted)
            .map(str::to_string)
            .collect();
        if matches.is_empty() {
            bail!("unknown class `{filter}`");
        }
        out.extend(matches);
    }
    Ok(out)
}

/// Exactly one class for a filter; a short name shared by several classes
/// is an error listing them.
fn select_one(workspace: &Workspace, filter: &str) -> Result<String> {
    let mut matches = select_classes(workspace, &[filter.to_string()])?;
    if matches.len() > 1 {
        bail!("class `{filter}` is ambiguous: {}", matches.join(", "));
    }
    matches.pop().with_context(|| format!("unknown class `{filter}`"))
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            // Treat as a glob pattern
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            // Treat as a literal path
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
