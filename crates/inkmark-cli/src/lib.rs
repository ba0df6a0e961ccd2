use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inkmark_core::marking::HttpMarkingClient;
use inkmark_core::tools::PointerBehavior;
use inkmark_core::{
    AnnotationDocument, AnnotationEditor, AnnotationError, AnnotationViewer, EditorConfig,
    HeadlessFactory, MarkType, SaveOutcome, SessionTokens, Submission, ToolKind, ToolManager,
    ToolSettings, UniformPages, ViewerSummary,
};
use kurbo::Size;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the bearer token for `mark`.
const TOKEN_ENV: &str = "INKMARK_TOKEN";

/// Largest document the CLI lays out.
const MAX_PAGES: u32 = 10_000;

#[derive(Debug, Parser)]
#[command(name = "inkmark")]
#[command(about = "Inspect and submit annotation documents")]
pub struct Cli {
    /// Config file. Defaults to the user config directory.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the annotations of a document, page by page.
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Page count of the annotated document. Defaults to the last annotated page.
        #[arg(long)]
        pages: Option<u32>,
        #[arg(long, default_value = "800x1100", value_parser = parse_size)]
        page_size: Size,
    },
    /// Print the brush a tool draws with.
    Brush {
        #[arg(long, default_value = "pen")]
        tool: ToolKind,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        size: Option<u32>,
    },
    /// Submit an annotation document as the marks for a submission.
    Mark {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        submission: String,
        #[arg(long, default_value = "assignment")]
        mark_type: MarkType,
        #[arg(long)]
        score: Option<f64>,
        #[arg(long)]
        feedback: Option<String>,
        /// Bearer token. Falls back to $INKMARK_TOKEN.
        #[arg(long)]
        token: Option<String>,
        /// Overrides the configured API base URL.
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        pages: Option<u32>,
        /// Print the request instead of sending it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InspectOutput {
    #[serde(flatten)]
    summary: ViewerSummary,
    dropped_pages: Vec<u32>,
    notices: Vec<String>,
}

#[derive(Debug, Serialize)]
struct BrushOutput {
    tool: ToolKind,
    behavior: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
}

#[derive(Debug, Serialize)]
struct DryRunOutput {
    method: &'static str,
    url: String,
    payload: inkmark_core::SavePayload,
}

fn parse_size(value: &str) -> Result<Size, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let width: f64 = w.trim().parse().map_err(|_| format!("invalid width {w:?}"))?;
    let height: f64 = h.trim().parse().map_err(|_| format!("invalid height {h:?}"))?;
    if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
        return Err(format!("page size must be positive, got {value:?}"));
    }
    Ok(Size::new(width, height))
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let config = EditorConfig::load_or_default(cli.config.as_deref())
        .context("failed to load config")?;

    match cli.command {
        Commands::Inspect {
            file,
            pages,
            page_size,
        } => run_inspect(&file, pages, page_size),
        Commands::Brush { tool, color, size } => run_brush(&config, tool, color, size),
        Commands::Mark {
            file,
            submission,
            mark_type,
            score,
            feedback,
            token,
            api_url,
            pages,
            dry_run,
        } => {
            let submission = Submission {
                id: submission,
                file_locator: file.display().to_string(),
                annotation_data: Some(read_document(&file)?),
                score,
                feedback,
            };
            let mut config = config;
            if let Some(url) = api_url {
                config.api.base_url = url;
            }
            let tokens = SessionTokens {
                local: token,
                session: std::env::var(TOKEN_ENV).ok(),
            };
            run_mark(config, submission, mark_type, pages, &tokens, dry_run)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn read_document(file: &Path) -> Result<String> {
    if !file.exists() {
        anyhow::bail!("file does not exist: {}", file.display());
    }
    fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

/// Page count to lay the document out on.
fn page_count_for(json: &str, pages: Option<u32>) -> Result<u32> {
    let count = pages
        .or_else(|| AnnotationDocument::from_json(json).ok()?.last_page())
        .unwrap_or(1);
    if count > MAX_PAGES {
        anyhow::bail!("document has {count} pages, at most {MAX_PAGES} are supported");
    }
    Ok(count)
}

fn run_inspect(file: &Path, pages: Option<u32>, page_size: Size) -> Result<()> {
    let json = read_document(file)?;
    let locator = file.display().to_string();

    let mut viewer = AnnotationViewer::new(&locator, Some(&json), Box::new(HeadlessFactory));
    viewer.drive(&mut UniformPages::new(page_count_for(&json, pages)?, page_size));

    let output = InspectOutput {
        summary: viewer.summary(),
        dropped_pages: viewer
            .last_report()
            .map(|r| r.dropped.clone())
            .unwrap_or_default(),
        notices: viewer.take_notices().iter().map(ToString::to_string).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    viewer.close();
    Ok(())
}

fn run_brush(
    config: &EditorConfig,
    tool: ToolKind,
    color: Option<String>,
    size: Option<u32>,
) -> Result<()> {
    let manager = ToolManager::new(ToolSettings {
        tool,
        color: color.unwrap_or_else(|| config.tools.color.clone()),
        brush_size: size.unwrap_or(config.tools.brush_size),
    });

    let output = match manager.settings().pointer_behavior(config) {
        PointerBehavior::FreeDraw(brush) => BrushOutput {
            tool,
            behavior: "free_draw",
            width: Some(brush.width),
            color: Some(brush.color.to_css()),
        },
        PointerBehavior::InsertText(style) => BrushOutput {
            tool,
            behavior: "insert_text",
            width: None,
            color: Some(style.color.to_css()),
        },
        PointerBehavior::Erase => BrushOutput {
            tool,
            behavior: "erase",
            width: None,
            color: None,
        },
        PointerBehavior::Select => BrushOutput {
            tool,
            behavior: "select",
            width: None,
            color: None,
        },
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_mark(
    config: EditorConfig,
    submission: Submission,
    mark_type: MarkType,
    pages: Option<u32>,
    tokens: &SessionTokens,
    dry_run: bool,
) -> Result<()> {
    let page_count = page_count_for(submission.annotation_data.as_deref().unwrap_or(""), pages)?;
    let client = HttpMarkingClient::new(&config.api)?;

    let mut editor =
        AnnotationEditor::new(submission, mark_type, config, Box::new(HeadlessFactory));
    editor.drive(&mut UniformPages::new(page_count, Size::new(800.0, 1100.0)));

    // Submitting blank pages over unreadable marks would lose them
    if let Some(problem) = editor
        .take_notices()
        .into_iter()
        .find(|n| matches!(n, AnnotationError::MalformedAnnotationData(_)))
    {
        anyhow::bail!("refusing to submit: {problem}");
    }

    if dry_run {
        let request = editor.prepare_save(tokens)?;
        let url = client.endpoint(request.mark_type, &request.payload.submission_id)?;
        let output = DryRunOutput {
            method: "PUT",
            url: url.to_string(),
            payload: request.payload,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match pollster::block_on(editor.save(&client, tokens))? {
        SaveOutcome::Saved(receipt) if receipt.message.is_empty() => println!("saved"),
        SaveOutcome::Saved(receipt) => println!("{}", receipt.message),
        SaveOutcome::Discarded => println!("discarded"),
    }
    editor.close();
    Ok(())
}
