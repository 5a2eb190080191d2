//! Runs `.test.md` composer scenarios.
//!
//! A scenario file is TOML frontmatter between `---` lines followed by a
//! key script (see [`composer::parse_keys`]). The script is typed into a
//! fresh composer whose mention lookup serves the scenario's `entities`;
//! the resulting document is compared with the `expect_*` fields.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use composer::{Composer, Entity, MatchMode, StaticLookup, parse_keys};
use richdoc::Renderer;
use serde::Deserialize;

use crate::settings::Settings;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub description: Option<String>,

    /// What the mention lookup knows about.
    #[serde(default)]
    pub entities: Vec<Entity>,

    /// Overrides `mentions.match_mode` from the settings.
    #[serde(default)]
    pub match_mode: Option<MatchMode>,

    /// Transport string loaded before typing, as when editing a post.
    #[serde(default)]
    pub load: Option<String>,

    /// Expected transport string, compared as JSON.
    #[serde(default)]
    pub expect_transport: Option<String>,

    /// Expected rendered HTML (trimmed comparison).
    #[serde(default)]
    pub expect_html: Option<String>,

    /// Expected plain-text projection (trimmed comparison).
    #[serde(default)]
    pub expect_text: Option<String>,

    /// Entity ids of the mentions in the final document, in reading order.
    #[serde(default)]
    pub expect_mentions: Option<Vec<i64>>,

    /// The script must be rejected with an error containing this text.
    #[serde(default)]
    pub expect_error: Option<String>,
}

/// Split a scenario file into its frontmatter and key script.
fn split_frontmatter(content: &str) -> Result<(Scenario, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let body = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);

    let close = body
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;
    let frontmatter = body[..close].trim_end_matches('\r');
    let rest = &body[close + 4..];
    let script = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let scenario: Scenario =
        toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((scenario, script))
}

/// Type `script` into a fresh composer, consulting the lookup after every key.
async fn play(scenario: &Scenario, script: &str, settings: &Settings) -> Result<Composer, String> {
    let keys = parse_keys(script).map_err(|e| e.to_string())?;

    let mut config = settings.composer_config();
    if let Some(mode) = scenario.match_mode {
        config.mentions.match_mode = mode;
    }
    let lookup = StaticLookup::new(scenario.entities.clone())
        .with_matching(config.mentions.match_mode, config.mentions.limit);

    let mut composer = Composer::new(config);
    if let Some(transport) = &scenario.load {
        composer.load(transport);
    }
    for key in keys {
        composer.handle_key(key).map_err(|e| format!("{} rejected: {}", key, e))?;
        composer.refresh_suggestions(&lookup).await;
    }
    Ok(composer)
}

/// Compare the final composer against every expectation the scenario sets.
fn check(scenario: &Scenario, composer: &Composer, renderer: &Renderer) -> Vec<String> {
    let mut problems = Vec::new();
    let doc = composer.document();

    if let Some(expected) = &scenario.expect_transport {
        let actual = composer.serialized();
        let same = match (
            serde_json::from_str::<serde_json::Value>(expected),
            serde_json::from_str::<serde_json::Value>(&actual),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => expected.trim() == actual.trim(),
        };
        if !same {
            problems.push(format!(
                "transport mismatch\n  expected: {}\n  actual:   {}",
                expected.trim(),
                actual
            ));
        }
    }

    if let Some(expected) = &scenario.expect_html {
        let actual = renderer.render_document(doc);
        if actual.trim() != expected.trim() {
            problems.push(format!(
                "html mismatch\n  expected: {}\n  actual:   {}",
                expected.trim(),
                actual.trim()
            ));
        }
    }

    if let Some(expected) = &scenario.expect_text {
        let actual = richdoc::render::plain_text(doc);
        if actual.trim() != expected.trim() {
            problems.push(format!(
                "text mismatch\n  expected: {}\n  actual:   {}",
                expected.trim(),
                actual.trim()
            ));
        }
    }

    if let Some(expected) = &scenario.expect_mentions {
        let actual: Vec<i64> = doc.mentions().into_iter().map(|(id, _)| id).collect();
        if &actual != expected {
            problems.push(format!(
                "mentions mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    problems
}

pub enum Outcome {
    Pass,
    Fail(String),
}

pub struct ScenarioResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: Outcome,
}

impl ScenarioResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("?")
        })
    }
}

struct Runner<'a> {
    settings: &'a Settings,
    renderer: Renderer,
    runtime: tokio::runtime::Runtime,
}

impl Runner<'_> {
    fn run(&self, path: &Path) -> ScenarioResult {
        let (description, outcome) = match self.evaluate(path) {
            Ok((description, None)) => (description, Outcome::Pass),
            Ok((description, Some(reason))) => (description, Outcome::Fail(reason)),
            Err(reason) => (None, Outcome::Fail(reason)),
        };
        ScenarioResult {
            path: path.to_path_buf(),
            description,
            outcome,
        }
    }

    /// `Ok((description, failure))` once the file parsed; `Err` when it could
    /// not be read or parsed at all.
    fn evaluate(&self, path: &Path) -> Result<(Option<String>, Option<String>), String> {
        let content = std::fs::read_to_string(path).map_err(|e| format!("cannot read file: {}", e))?;
        let (scenario, script) =
            split_frontmatter(&content).map_err(|e| format!("frontmatter error: {}", e))?;
        let description = scenario.description.clone();

        let played = self.runtime.block_on(play(&scenario, script, self.settings));
        tracing::debug!(path = %path.display(), ok = played.is_ok(), "scenario played");

        let failure = match (&scenario.expect_error, played) {
            (Some(expected), Err(actual)) if actual.contains(expected.as_str()) => None,
            (Some(expected), Err(actual)) => Some(format!(
                "expected error containing \"{}\", got: {}",
                expected, actual
            )),
            (Some(expected), Ok(_)) => Some(format!(
                "expected error containing \"{}\", but the script ran",
                expected
            )),
            (None, Err(actual)) => Some(format!("unexpected error: {}", actual)),
            (None, Ok(composer)) => {
                let problems = check(&scenario, &composer, &self.renderer);
                (!problems.is_empty()).then(|| problems.join("\n"))
            }
        };
        Ok((description, failure))
    }
}

/// `.test.md` files under `root`, grouped by their folder relative to it.
/// Files directly in `root` fall under "".
fn discover(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut found: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    walk(root, root, &mut found);
    for files in found.values_mut() {
        files.sort();
    }
    found
}

fn walk(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        if path.is_dir() {
            walk(&path, root, out);
            continue;
        }
        let is_scenario = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".test.md"));
        if is_scenario {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} scenarios)", category_label(category), files.len());
    }
}

fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// Pick the categories to run. A requested category also selects its
/// subfolders.
fn select<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }
    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run every scenario under `path` (or the single file `path`). Returns the
/// process exit code: 0 when everything passed.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String], settings: &Settings) -> i32 {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: cannot start runtime: {}", e);
            return 1;
        }
    };
    let runner = Runner {
        settings,
        renderer: Renderer::new(settings.render_options()),
        runtime,
    };

    let single;
    let all;
    let groups: BTreeMap<&str, &[PathBuf]> = if path.is_file() {
        single = [path.to_path_buf()];
        BTreeMap::from([("", &single[..])])
    } else {
        all = discover(path);
        if all.is_empty() {
            eprintln!("no .test.md files found in {}", path.display());
            return 1;
        }
        select(&all, categories)
    };
    if groups.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures = Vec::new();
    for (category, files) in &groups {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", paint(category_label(category), "1", no_color));
        }
        for file in *files {
            let result = runner.run(file);
            match result.outcome {
                Outcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", paint("PASS", "32", no_color), result.label());
                }
                Outcome::Fail(_) => {
                    eprintln!("  {}  {}", paint("FAIL", "31", no_color), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let Outcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", paint("ok", "32", no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}
