//! Interactive session.
//!
//! A dialoguer menu loop over the workflow stages; the human edit opens the
//! draft in `$EDITOR` via the `edit` crate.

use crate::agent::Style;
use crate::config::Config;
use crate::version::{SearchResult, Version};
use crate::workflow::{Comparison, Session, Workflow, WorkflowError};
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};

/// Characters of each stage output shown after it is produced
const PREVIEW_CHARS: usize = 1000;

/// Upper bound of the search result-count control
const MAX_RESULTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Scrape,
    Rewrite,
    Review,
    Approve,
    Narrate,
    Search,
    Compare,
    ToggleAutoSave,
    Reset,
    Quit,
}

impl Action {
    const MENU: [Action; 10] = [
        Action::Scrape,
        Action::Rewrite,
        Action::Review,
        Action::Approve,
        Action::Narrate,
        Action::Search,
        Action::Compare,
        Action::ToggleAutoSave,
        Action::Reset,
        Action::Quit,
    ];

    fn label(&self, session: &Session) -> String {
        match self {
            Action::Scrape => "🔍 Scrape chapter".to_string(),
            Action::Rewrite => "✍️  Rewrite with AI".to_string(),
            Action::Review => "🧠 Review & refine".to_string(),
            Action::Approve => "✅ Edit, approve & save final version".to_string(),
            Action::Narrate => "🔊 Narrate".to_string(),
            Action::Search => "🔎 Search versions".to_string(),
            Action::Compare => "🧬 Compare versions".to_string(),
            Action::ToggleAutoSave => format!(
                "💾 Auto-save drafts: {}",
                if session.auto_save { "on" } else { "off" }
            ),
            Action::Reset => "♻️  Reset all".to_string(),
            Action::Quit => "Quit".to_string(),
        }
    }
}

/// Run the interactive session until the user quits
pub async fn run(workflow: &Workflow<'_>, config: &Config) -> anyhow::Result<()> {
    let theme = ColorfulTheme::default();
    let mut session = Session::new(config.workflow.auto_save);
    let mut url = config.workflow.default_url.clone();

    println!("{}", "📖 Automated Book Publication Workflow".bold());

    loop {
        let labels: Vec<String> = Action::MENU.iter().map(|a| a.label(&session)).collect();
        let choice = Select::with_theme(&theme)
            .with_prompt("What next?")
            .items(&labels)
            .default(0)
            .interact()?;

        let outcome = match Action::MENU[choice] {
            Action::Scrape => {
                url = Input::with_theme(&theme)
                    .with_prompt("Chapter URL")
                    .default(url.clone())
                    .interact_text()?;
                scrape(workflow, &mut session, &url).await
            }
            Action::Rewrite => rewrite(workflow, &mut session, &theme).await?,
            Action::Review => {
                println!("Reviewing text...");
                workflow.review(&mut session).await.map(|text| {
                    println!("{}", "✅ Reviewed text ready.".green());
                    print_preview("🧠 AI Reviewed", &text);
                })
            }
            Action::Approve => approve(workflow, &session, &theme)?,
            Action::Narrate => narrate(workflow, &session, &theme).await?,
            Action::Search => search(workflow, &theme)?,
            Action::Compare => compare(workflow, &theme)?,
            Action::ToggleAutoSave => {
                session.auto_save = !session.auto_save;
                Ok(())
            }
            Action::Reset => {
                session.reset();
                url = config.workflow.default_url.clone();
                println!("Session cleared.");
                Ok(())
            }
            Action::Quit => return Ok(()),
        };

        if let Err(e) = outcome {
            report(&e);
        }
    }
}

async fn scrape(workflow: &Workflow<'_>, session: &mut Session, url: &str) -> Result<(), WorkflowError> {
    println!("Scraping content...");
    let chapter = workflow.scrape(session, url).await?;
    println!("{}", format!("✅ Chapter '{}' scraped.", chapter.title).green());
    println!("📸 Snapshot saved at: {}", chapter.snapshot_path.display());
    print_preview("📝 Original", &chapter.text);
    Ok(())
}

async fn rewrite(
    workflow: &Workflow<'_>,
    session: &mut Session,
    theme: &ColorfulTheme,
) -> anyhow::Result<Result<(), WorkflowError>> {
    if session.chapter.is_none() {
        return Ok(Err(WorkflowError::MissingChapter));
    }

    let styles: Vec<&str> = Style::ALL.iter().map(Style::as_str).collect();
    let current = Style::ALL.iter().position(|s| *s == session.style).unwrap_or(0);
    let style = Style::ALL[Select::with_theme(theme)
        .with_prompt("Rewrite style")
        .items(&styles)
        .default(current)
        .interact()?];

    let tone: String = Input::with_theme(theme)
        .with_prompt("Optional tone (e.g. 'mysterious', 'joyful')")
        .default(session.tone.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    println!("Generating rewritten text...");
    Ok(workflow
        .rewrite(session, style, Some(tone.as_str()))
        .await
        .map(|text| {
            println!("{}", "✅ Rewritten text generated.".green());
            print_preview("✍️  AI Rewritten", &text);
        }))
}

fn approve(
    workflow: &Workflow<'_>,
    session: &Session,
    theme: &ColorfulTheme,
) -> anyhow::Result<Result<(), WorkflowError>> {
    let edited = edit::edit(session.draft())?;
    // Editors append a trailing newline
    let final_text = edited.trim_end_matches(['\n', '\r']);

    print_preview("🧑‍💻 Final draft", final_text);
    let confirmed = Confirm::with_theme(theme)
        .with_prompt("Approve & save this final version?")
        .default(true)
        .interact()?;
    if !confirmed {
        return Ok(Ok(()));
    }

    Ok(workflow.approve(session, final_text).map(|version| {
        println!(
            "{}",
            format!(
                "🎉 Final version {} saved and exported to {}",
                version.id,
                workflow.export_path().display()
            )
            .green()
        );
    }))
}

async fn narrate(
    workflow: &Workflow<'_>,
    session: &Session,
    theme: &ColorfulTheme,
) -> anyhow::Result<Result<(), WorkflowError>> {
    let sources = narration_sources(session);
    let labels: Vec<&str> = sources.iter().map(|(label, _)| *label).collect();
    let choice = Select::with_theme(theme)
        .with_prompt("Narrate which text?")
        .items(&labels)
        .default(0)
        .interact()?;
    let text = sources[choice].1.unwrap_or_default();

    Ok(workflow.narrate(text).await.map(|path| {
        println!("{}", format!("🔊 Audio written to {}", path.display()).green());
    }))
}

/// Texts offered for narration, labelled for the selector
fn narration_sources(session: &Session) -> [(&'static str, Option<&str>); 4] {
    [
        ("Original", session.chapter.as_ref().map(|c| c.text.as_str())),
        ("Rewritten", session.rewritten.as_deref()),
        ("Reviewed", session.reviewed.as_deref()),
        ("Final draft", Some(session.draft())),
    ]
}

fn search(workflow: &Workflow<'_>, theme: &ColorfulTheme) -> anyhow::Result<Result<(), WorkflowError>> {
    let query: String = Input::with_theme(theme)
        .with_prompt("Search for past versions (a phrase or sentence)")
        .allow_empty(true)
        .interact_text()?;
    let top_k: usize = Input::with_theme(theme)
        .with_prompt(format!("Number of results (1-{MAX_RESULTS})"))
        .default(crate::storage::DEFAULT_TOP_K)
        .interact_text()?;

    Ok(workflow
        .search(&query, top_k.clamp(1, MAX_RESULTS))
        .map(|results| print_results(&results)))
}

fn compare(workflow: &Workflow<'_>, theme: &ColorfulTheme) -> anyhow::Result<Result<(), WorkflowError>> {
    let versions = match workflow.versions() {
        Ok(versions) => versions,
        Err(e) => return Ok(Err(e)),
    };
    if versions.len() < 2 {
        println!("{}", "Need at least 2 saved versions to compare.".cyan());
        return Ok(Ok(()));
    }

    let labels: Vec<String> = versions.iter().map(Version::label).collect();
    let a = Select::with_theme(theme)
        .with_prompt("🔵 Version A")
        .items(&labels)
        .default(0)
        .interact()?;
    let b = Select::with_theme(theme)
        .with_prompt("🟠 Version B")
        .items(&labels)
        .default(1)
        .interact()?;

    Ok(workflow
        .compare(&versions[a].id, &versions[b].id)
        .map(|comparison| print_comparison(&comparison)))
}

/// Print search hits with their similarity labels
pub fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("{}", "No matches found yet.".cyan());
        return;
    }
    for hit in results {
        println!("\n📄 {}", hit.label().bold());
        println!("   id: {}", hit.version.id.dimmed());
        println!("{}", preview(&hit.version.text));
    }
}

/// Print a diff with added lines in green and removed lines in red
pub fn print_comparison(comparison: &Comparison) {
    match comparison {
        Comparison::Identical => println!("{}", "✅ No differences found!".green()),
        Comparison::Diff(diff) => {
            for line in diff.lines() {
                if line.starts_with("+++") || line.starts_with("---") {
                    println!("{}", line.bold());
                } else if line.starts_with('+') {
                    println!("{}", line.green());
                } else if line.starts_with('-') {
                    println!("{}", line.red());
                } else if line.starts_with("@@") {
                    println!("{}", line.cyan());
                } else {
                    println!("{line}");
                }
            }
        }
    }
}

/// Print a stage output, cut to the preview length
pub fn print_preview(heading: &str, text: &str) {
    println!("\n{}\n", heading.bold());
    println!("{}", preview(text));
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}\n...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Validation problems are warnings; collaborator failures are errors
pub fn report(err: &WorkflowError) {
    if err.is_validation() {
        println!("{}", format!("⚠️  {err}").yellow());
    } else {
        tracing::error!(error = %err, "action failed");
        println!("{}", format!("❌ {err}").red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_cuts_long_text() {
        let long = "x".repeat(PREVIEW_CHARS + 5);
        let shown = preview(&long);
        assert!(shown.ends_with("\n..."));
        assert_eq!(shown.chars().filter(|c| *c == 'x').count(), PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn final_draft_can_be_narrated() {
        let mut session = Session::new(false);
        session.rewritten = Some("spun".to_string());
        let sources = narration_sources(&session);
        assert_eq!(sources[3], ("Final draft", Some("spun")));

        session.reviewed = Some("polished".to_string());
        assert_eq!(narration_sources(&session)[3].1, Some("polished"));
        assert_eq!(narration_sources(&session)[0].1, None);
    }

    #[test]
    fn menu_label_reflects_auto_save() {
        let mut session = Session::new(false);
        assert!(Action::ToggleAutoSave.label(&session).ends_with("off"));
        session.auto_save = true;
        assert!(Action::ToggleAutoSave.label(&session).ends_with("on"));
    }
}
