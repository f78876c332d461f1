mod render;

use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;

use textcritical_backend::app_settings::ImportOptions;
use textcritical_backend::batch_import::{import_directory, import_file};
use textcritical_backend::beta_code;
use textcritical_backend::encoding::read_xml_file;
use textcritical_backend::html_transformer::convert_xml;
use textcritical_backend::language_tools::{Language, strip_accents};
use textcritical_backend::logger;
use textcritical_backend::notes::extract_notes;
use textcritical_backend::text_model::{Division, ImportedWork};

#[derive(Parser, Debug)]
#[command(author, version, about = "TextCritical CLI", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// silent, error, warn, info or debug. Overrides LOG_LEVEL.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Import switches. Flags override the TEXTCRITICAL_* environment variables,
/// which override the options file.
#[derive(Args, Debug)]
struct ImportFlags {
    /// JSON file with import options
    #[arg(long, value_name = "FILE_PATH")]
    options: Option<PathBuf>,

    /// Treat division markers as plain markup
    #[arg(long)]
    ignore_divisions: bool,

    /// Skip content until the first milestone
    #[arg(long)]
    ignore_content_before_milestones: bool,

    /// Fold divisions the header does not declare into their parent
    #[arg(long)]
    ignore_undeclared_divs: bool,

    /// Fail on divisions the header does not declare
    #[arg(long)]
    reject_undeclared_divs: bool,

    /// Deepest division level to create
    #[arg(long, value_name = "LEVEL")]
    division_min: Option<u32>,

    /// Leave notes out of the imported verses
    #[arg(long)]
    ignore_notes: bool,

    /// Index of the refsDecl to use (default: all merged)
    #[arg(long, value_name = "INDEX")]
    state_set: Option<usize>,

    /// Title divisions by their line range
    #[arg(long, conflicts_with = "no_line_titles")]
    line_titles: bool,

    /// Never title divisions by their line range
    #[arg(long)]
    no_line_titles: bool,
}

impl ImportFlags {
    fn to_options(&self) -> Result<ImportOptions> {
        let mut options = match &self.options {
            Some(path) => ImportOptions::from_json_file(path)?.apply_env(),
            None => ImportOptions::from_env(),
        };

        options.ignore_divisions |= self.ignore_divisions;
        options.ignore_content_before_milestones |= self.ignore_content_before_milestones;
        options.ignore_undeclared_divs |= self.ignore_undeclared_divs;
        options.reject_undeclared_divs |= self.reject_undeclared_divs;
        options.ignore_notes |= self.ignore_notes;
        if self.division_min.is_some() {
            options.division_min = self.division_min;
        }
        if self.state_set.is_some() {
            options.state_set = self.state_set;
        }
        if self.line_titles {
            options.use_line_count_for_divisions = Some(true);
        }
        if self.no_line_titles {
            options.use_line_count_for_divisions = Some(false);
        }

        Ok(options)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a TEI document and print its divisions and verses
    #[command(arg_required_else_help = true)]
    Import {
        #[arg(value_name = "FILE_PATH")]
        path: PathBuf,

        /// Print the imported work as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        flags: ImportFlags,
    },

    /// Import every XML document in a directory
    #[command(arg_required_else_help = true)]
    ImportDir {
        #[arg(value_name = "DIRECTORY_PATH")]
        path: PathBuf,

        /// Number of worker threads
        #[arg(long, default_value_t = 4)]
        workers: usize,

        #[command(flatten)]
        flags: ImportFlags,
    },

    /// Convert Beta Code to Unicode Greek
    #[command(name = "beta2unicode", arg_required_else_help = true)]
    BetaToUnicode { text: String },

    /// Convert Unicode Greek to Beta Code
    #[command(name = "unicode2beta", arg_required_else_help = true)]
    UnicodeToBeta { text: String },

    /// Remove accents and other diacritics
    #[command(arg_required_else_help = true)]
    StripAccents { text: String },

    /// Render a markup file as HTML
    #[command(arg_required_else_help = true)]
    Render {
        #[arg(value_name = "FILE_PATH")]
        path: PathBuf,

        /// Language of the text, e.g. "greek" to read it as Beta Code
        #[arg(long)]
        language: Option<String>,
    },

    /// Import a TEI document and list its notes
    #[command(arg_required_else_help = true)]
    Notes {
        #[arg(value_name = "FILE_PATH")]
        path: PathBuf,

        #[command(flatten)]
        flags: ImportFlags,
    },

    /// Import a TEI document and print the plain text of its verses
    #[command(arg_required_else_help = true)]
    Text {
        #[arg(value_name = "FILE_PATH")]
        path: PathBuf,

        /// Print notes as footnotes after each verse
        #[arg(long, default_value_t = false)]
        notes_at_end: bool,

        #[command(flatten)]
        flags: ImportFlags,
    },
}

fn print_division(division: &Division, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}{} ({} verses)", indent, division, division.verses.len());
    for child in &division.children {
        print_division(child, depth + 1);
    }
}

fn import_document(path: &Path, flags: &ImportFlags) -> Result<ImportedWork> {
    let options = flags.to_options()?;
    import_file(path, &options)
}

fn import_command(path: &Path, json: bool, flags: &ImportFlags) -> Result<()> {
    let work = import_document(path, flags)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&work)?);
        return Ok(());
    }

    println!("{}", work.title.as_deref().unwrap_or("(untitled)"));
    if !work.authors.is_empty() {
        println!("Authors: {}", work.authors.join(", "));
    }
    if !work.editors.is_empty() {
        println!("Editors: {}", work.editors.join(", "));
    }
    for division in &work.root.children {
        print_division(division, 0);
    }
    Ok(())
}

fn import_dir_command(path: &Path, workers: usize, flags: &ImportFlags) -> Result<()> {
    if !path.is_dir() {
        anyhow::bail!("Not a directory: {:?}", path);
    }
    let options = flags.to_options()?;
    let report = import_directory(path, &options, workers)?;

    for (path, work) in &report.imported {
        println!(
            "OK      {}: {} ({} verses)",
            path.display(),
            work.title.as_deref().unwrap_or("(untitled)"),
            work.root.verse_count()
        );
    }
    for (path, error) in &report.failed {
        println!("FAILED  {}: {}", path.display(), error);
    }

    if !report.failed.is_empty() {
        anyhow::bail!("{} of {} documents failed", report.failed.len(), report.total());
    }
    Ok(())
}

fn render_command(path: &Path, language: Option<&str>) -> Result<()> {
    let xml = read_xml_file(path)?;
    let language = language.map(Language::parse);
    let node = convert_xml(&xml, language.as_ref()).with_context(|| format!("Failed to render {:?}", path))?;
    println!("{}", render::to_html(&node));
    Ok(())
}

fn notes_command(path: &Path, flags: &ImportFlags) -> Result<()> {
    let work = import_document(path, flags)?;
    for note in extract_notes(&work.root)? {
        println!("{} [{}]: {}", note.division_path, note.verse, note.text);
    }
    Ok(())
}

fn text_command(path: &Path, notes_at_end: bool, flags: &ImportFlags) -> Result<()> {
    let work = import_document(path, flags)?;
    let language = work.language();
    let mut divisions = vec![&work.root];
    divisions.extend(work.root.descendants());

    for division in divisions {
        if division.verses.is_empty() {
            continue;
        }
        println!("== {} ==", division);
        for verse in &division.verses {
            println!("{}  {}", verse.indicator, verse.plain_text(notes_at_end, language.as_ref())?);
        }
    }
    Ok(())
}

fn main() {
    if dotenv().is_err() {
        println!("Info: No .env file found or failed to load.");
    }

    let cli = Cli::parse();

    if let Some(level) = &cli.log_level {
        if !logger::set_log_level_str(level) {
            eprintln!("Error: Unknown log level: {}", level);
            exit(1);
        }
    }

    let command_result = match cli.command {
        Commands::Import { path, json, flags } => import_command(&path, json, &flags),

        Commands::ImportDir { path, workers, flags } => import_dir_command(&path, workers, &flags),

        Commands::BetaToUnicode { text } => {
            println!("{}", beta_code::to_unicode(&text));
            Ok(())
        }

        Commands::UnicodeToBeta { text } => {
            println!("{}", beta_code::to_beta_code(&text));
            Ok(())
        }

        Commands::StripAccents { text } => {
            println!("{}", strip_accents(&text));
            Ok(())
        }

        Commands::Render { path, language } => render_command(&path, language.as_deref()),

        Commands::Notes { path, flags } => notes_command(&path, &flags),

        Commands::Text { path, notes_at_end, flags } => text_command(&path, notes_at_end, &flags),
    };

    if let Err(e) = command_result {
        logger::error(&format!("{:#}", e));
        eprintln!("Error executing command: {:#}", e);
        exit(1);
    }
}
