//! Results collection
//!
//! The appliance writes result files relative to the process working
//! directory, so collection happens inside a scoped-workdir guard that
//! puts the process back where it was on every exit path.

use std::path::Path;
use tracing::info;

use crate::campaign::CampaignError;
use crate::stc::StcApi;
use crate::utils::ScopedWorkdir;

const RESULTS_DB: &str = "results.db";

/// Save results for one test case and tear down the appliance session.
///
/// Runs inside `output_dir`: saves the detailed results database,
/// synchronizes result files from the lab server, disconnects the
/// chassis, and terminates the session.
pub async fn collect_results<C: StcApi>(
    stc: &mut C,
    output_dir: &Path,
    case: usize,
) -> Result<(), CampaignError> {
    let app = CampaignError::appliance(case);
    let _workdir = ScopedWorkdir::enter(output_dir)?;

    info!("saving results into {}", output_dir.display());
    stc.perform(
        "SaveResult",
        &[
            ("CollectResult", "true"),
            ("SaveDetailedResults", "true"),
            ("DatabaseConnectionString", RESULTS_DB),
            ("OverwriteIfExist", "true"),
        ],
    )
    .await
    .map_err(&app)?;

    stc.perform("CsSynchronizeFiles", &[]).await.map_err(&app)?;
    info!("result directory: {}", output_dir.display());

    info!("terminating session");
    stc.perform("ChassisDisconnectAll", &[])
        .await
        .map_err(&app)?;
    stc.end_session(true).await.map_err(&app)?;

    Ok(())
}
