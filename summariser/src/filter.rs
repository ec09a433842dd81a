use itertools::Itertools;
use schedsim_sweep_model::SweepSummary;

/// Keep only the latest run of every sweep configuration, ordered by sweep name.
pub fn latest_sweep_summaries_by_name_and_config(
    summaries: Vec<SweepSummary>,
) -> Vec<(String, String, SweepSummary)> {
    summaries
        .into_iter()
        .into_group_map_by(|summary| (summary.sweep_name.clone(), summary.fingerprint()))
        .into_iter()
        .filter_map(|((name, fingerprint), summaries)| {
            summaries
                .into_iter()
                .max_by_key(|summary| summary.started_at)
                .map(|summary| (name, fingerprint, summary))
        })
        .sorted_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .collect::<Vec<_>>()
}
