use anyhow::Context;
use schedsim_summariser::aggregator::{group_for_comparison, MetricSelector, MissingPolicy};
use schedsim_summariser::filter::latest_sweep_summaries_by_name_and_config;
use schedsim_summariser::model::{ComparisonOutput, SummaryOutput};
use schedsim_summariser::{summarise_comparison, summarise_sweep_summary};
use schedsim_sweep_model::{load_sweep_summaries, PointParameter, SweepSummary};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SELECTORS: [MetricSelector; 3] = [
    MetricSelector::Average,
    MetricSelector::P50,
    MetricSelector::P99,
];

fn test_data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test_data")
}

fn latest_summaries() -> anyhow::Result<Vec<SweepSummary>> {
    let summaries = load_sweep_summaries(&test_data_dir().join("sweep_summary.jsonl"))?;
    Ok(latest_sweep_summaries_by_name_and_config(summaries)
        .into_iter()
        .map(|(_, _, summary)| summary)
        .collect())
}

fn check_snapshot<T>(name: &str, output: &T) -> anyhow::Result<()>
where
    T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let path = test_data_dir().join("expected").join(format!("{name}.json"));

    if option_env!("UPDATE_SNAPSHOTS") == Some("1") {
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, output)?;
        return Ok(());
    }

    let expected = serde_json::from_reader::<_, T>(
        std::fs::File::open(&path)
            .with_context(|| format!("Failed to load expected output {}", path.display()))?,
    )?;
    pretty_assertions::assert_eq!(
        &expected,
        output,
        "Snapshot mismatch, run with `UPDATE_SNAPSHOTS=1 cargo test --test snapshot` to update"
    );
    Ok(())
}

macro_rules! run_snapshot_test {
    ($sweep_name:literal) => {
        env_logger::try_init().ok();

        let summary = latest_summaries()?
            .into_iter()
            .find(|s| s.sweep_name == $sweep_name)
            .with_context(|| format!("Sweep summary not found: {}", $sweep_name))?;

        let output: SummaryOutput =
            summarise_sweep_summary(&summary, &test_data_dir(), &SELECTORS, MissingPolicy::Drop)?;

        check_snapshot($sweep_name, &output)?;
    };
}

#[test]
fn latest_run_of_each_sweep_is_selected() -> anyhow::Result<()> {
    let latest = latest_summaries()?;

    let names = latest
        .iter()
        .map(|s| (s.sweep_name.as_str(), s.run_id.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![("cores", "run-new"), ("md1", "run-new"), ("mm1", "run-new")]
    );
    Ok(())
}

#[test]
fn every_summary_has_a_snapshot() {
    let expected = WalkDir::new(test_data_dir().join("expected"))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .collect::<Vec<_>>();

    for summary in latest_summaries().unwrap() {
        assert!(
            expected.contains(&summary.sweep_name),
            "No snapshot for {}",
            summary.sweep_name
        );
    }
}

#[test]
fn mm1() -> anyhow::Result<()> {
    run_snapshot_test!("mm1");
    Ok(())
}

#[test]
fn md1() -> anyhow::Result<()> {
    run_snapshot_test!("md1");
    Ok(())
}

#[test]
fn cores() -> anyhow::Result<()> {
    run_snapshot_test!("cores");
    Ok(())
}

#[test]
fn sweeps_differing_in_service_are_compared() -> anyhow::Result<()> {
    let groups = group_for_comparison(latest_summaries()?, PointParameter::Service);
    assert_eq!(groups.len(), 1);

    let output: ComparisonOutput = summarise_comparison(
        &groups[0],
        PointParameter::Service,
        &test_data_dir(),
        &SELECTORS,
        MissingPolicy::Drop,
    )?;

    check_snapshot("comparison_service", &output)
}

#[test]
fn abort_policy_rejects_partial_sweep() -> anyhow::Result<()> {
    let latest = latest_summaries()?;
    let mm1 = latest
        .iter()
        .find(|s| s.sweep_name == "mm1")
        .context("mm1 not found")?;
    let md1 = latest
        .iter()
        .find(|s| s.sweep_name == "md1")
        .context("md1 not found")?;

    let err = summarise_sweep_summary(mm1, &test_data_dir(), &SELECTORS, MissingPolicy::Abort)
        .unwrap_err();
    assert!(
        format!("{err:#}").contains("missing points at indexes [1]"),
        "{err:#}"
    );

    // A complete sweep is unaffected by the policy
    assert!(summarise_sweep_summary(md1, &test_data_dir(), &SELECTORS, MissingPolicy::Abort).is_ok());
    Ok(())
}

#[test]
fn truncated_data_file_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut mm1 = latest_summaries()?
        .into_iter()
        .find(|s| s.sweep_name == "mm1")
        .context("mm1 not found")?;

    // Keep only the first of the two recorded blocks
    let data = std::fs::read_to_string(test_data_dir().join("mm1.dat"))?;
    let first_block = data.lines().take(4).collect::<Vec<_>>().join("\n") + "\n";
    std::fs::write(dir.path().join("mm1.dat"), first_block)?;
    mm1.data_file = PathBuf::from("mm1.dat");

    let err = summarise_sweep_summary(&mm1, dir.path(), &SELECTORS, MissingPolicy::Drop)
        .unwrap_err();
    assert!(format!("{err:#}").contains("does not match its summary"), "{err:#}");
    Ok(())
}
