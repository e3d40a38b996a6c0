use common::{
    aggregate::aggregate,
    config::{Config, Pipeline},
    extract::{Extractor, extract_file},
    record::BenchmarkRecord,
};
use eyre::{Context, Result, bail};
use tracing::{info, warn};

/// Pipelines named in `names`, in config order. All of them when `names` is empty
pub fn select<'a>(config: &'a Config, names: &[String]) -> Result<Vec<&'a Pipeline>> {
    if let Some(unknown) = names.iter().find(|n| config.pipeline(n).is_none()) {
        bail!("No pipeline named {unknown}");
    }
    Ok(config
        .pipelines
        .iter()
        .filter(|p| names.is_empty() || names.contains(&p.name))
        .collect())
}

/// Extracts every source of `pipeline` in order and concatenates the results
pub fn load_records(pipeline: &Pipeline) -> Result<Vec<BenchmarkRecord>> {
    let extractor = Extractor::new(&pipeline.rule)
        .wrap_err_with(|| format!("Extraction rule of {}", pipeline.name))?;

    let sets = pipeline
        .sources
        .iter()
        .map(|source| -> Result<Vec<BenchmarkRecord>> {
            let records = extract_file(&source.path, &source.category, &extractor)?;
            if records.is_empty() {
                warn!("No {} records in {:?}", source.category, source.path);
            }
            Ok(records)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(aggregate(sets))
}

pub fn run_pipeline(pipeline: &Pipeline) -> Result<()> {
    let records = load_records(pipeline)?;
    info!(
        "{}: {} records from {} sources",
        pipeline.name,
        records.len(),
        pipeline.sources.len()
    );
    pipeline
        .plot
        .plot(&records, &pipeline.output)
        .wrap_err_with(|| format!("Plotting {} to {:?}", pipeline.name, pipeline.output))
}
