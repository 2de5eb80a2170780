use clap::{Parser, ValueEnum};
use color_eyre::eyre::eyre;

use fm_quickfix::analysis::{Analyzer, BddAnalyzer};
use fm_quickfix::editor::{InMemoryEditor, ModelEditor};
use fm_quickfix::explanation::ExplanationStrategy;
use fm_quickfix::formula::Formula;
use fm_quickfix::model::{FeatureModel, GroupKind};
use fm_quickfix::quickfix::{DefectDescriptor, QuickFix, QuickFixConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// Hello => -Adjective makes Adjective dead.
    Exclusion,
    /// The constraint -Period deactivates Period.
    Deactivated,
    /// Exclamation is the last live feature of its alternative group.
    Alternative,
    /// Two equivalent constraints.
    Redundant,
    /// A constraint that always holds.
    Tautology,
    /// A model without valid configurations.
    Void,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    Shortest,
    First,
    Exhaustive,
}

impl From<Strategy> for ExplanationStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Shortest => ExplanationStrategy::Shortest,
            Strategy::First => ExplanationStrategy::FirstViolation,
            Strategy::Exhaustive => ExplanationStrategy::Exhaustive,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Built-in defective model to resolve.
    #[arg(value_enum, default_value = "exclusion")]
    scenario: Scenario,

    /// How explanations are collected.
    #[clap(long, value_enum, default_value = "shortest")]
    strategy: Strategy,

    /// Apply the resolution with this index and re-analyse.
    #[clap(long, value_name = "INT")]
    apply: Option<usize>,
}

/// Sentence[Hello (mandatory), Adjective, Punctuation[Period, Exclamation] (alternative)]
fn sentence() -> color_eyre::Result<FeatureModel> {
    let mut model = FeatureModel::new("Sentence");
    model.add_mandatory("Sentence", "Hello")?;
    model.add_feature("Sentence", "Adjective")?;
    model.add_feature("Sentence", "Punctuation")?;
    model.add_feature("Punctuation", "Period")?;
    model.add_feature("Punctuation", "Exclamation")?;
    model.set_group("Punctuation", GroupKind::Alternative)?;
    Ok(model)
}

fn build(scenario: Scenario) -> color_eyre::Result<(FeatureModel, DefectDescriptor)> {
    let mut model = sentence()?;
    let descriptor = match scenario {
        Scenario::Exclusion => {
            model.add_constraint(Formula::implies(
                Formula::var("Hello"),
                Formula::not(Formula::var("Adjective")),
            ));
            DefectDescriptor::dead("Adjective")
        }
        Scenario::Deactivated => {
            model.add_constraint(Formula::not(Formula::var("Period")));
            DefectDescriptor::dead("Period")
        }
        Scenario::Alternative => {
            model.add_constraint(Formula::not(Formula::var("Period")));
            DefectDescriptor::false_optional("Exclamation")
        }
        Scenario::Redundant => {
            model.add_constraint(Formula::implies(Formula::var("Adjective"), Formula::var("Period")));
            let copy = model.add_constraint(Formula::or([
                Formula::lit("Adjective", false),
                Formula::var("Period"),
            ]));
            DefectDescriptor::redundant(copy)
        }
        Scenario::Tautology => {
            let id = model.add_constraint(Formula::or([Formula::var("Period"), Formula::lit("Period", false)]));
            DefectDescriptor::tautology(id)
        }
        Scenario::Void => {
            model.add_constraint(Formula::not(Formula::var("Hello")));
            DefectDescriptor::dead("Adjective")
        }
    };
    Ok((model, descriptor))
}

fn summary(analyzer: &BddAnalyzer) {
    println!("void: {}", analyzer.is_void());
    println!("configurations: {}", analyzer.count_configurations());
    println!("dead: {:?}", analyzer.dead_features());
    println!("false-optional: {:?}", analyzer.false_optional_features());
    println!("redundant: {:?}", analyzer.redundant_constraints());
    println!("tautologies: {:?}", analyzer.tautological_constraints());
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);

    let (model, descriptor) = build(args.scenario)?;
    let analyzer = BddAnalyzer::new(&model);
    summary(&analyzer);

    let config = QuickFixConfig::default().with_strategy(args.strategy.into());
    let report = QuickFix::with_config(&model, &analyzer, config).resolve(&descriptor);
    println!("{}: {:?}", descriptor, report.status);
    for (i, resolution) in report.resolutions.iter().enumerate() {
        println!("  [{}] {}", i, resolution.label());
    }

    if let Some(index) = args.apply {
        let resolution = report
            .resolutions
            .iter()
            .nth(index)
            .ok_or_else(|| eyre!("no resolution with index {}", index))?;
        let mut editor = InMemoryEditor::new(model);
        let events = editor.subscribe();
        let outcome = resolution.apply(&mut editor)?;
        println!("applied '{}': {:?}", resolution.label(), outcome);
        for event in events.try_iter() {
            println!("event: {:?}", event);
        }

        let fixed = editor.snapshot();
        println!("constraints after:");
        for constraint in fixed.constraints() {
            println!("  {} {}", constraint.id(), constraint.name());
        }
        summary(&BddAnalyzer::new(&fixed));
    }

    Ok(())
}
