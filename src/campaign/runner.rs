//! Campaign runner
//!
//! Executes the test plan case by case. Each case opens/joins the
//! appliance session, loads its TCC configuration, pushes device
//! addressing, resolves ARP, runs the sequencer, and harvests results.
//! A failure in any case aborts the remaining ones after best-effort
//! appliance cleanup.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::addressing::{configure_ipv4, configure_ipv6};
use super::arp::{ArpPoller, ArpState};
use super::error::CampaignError;
use crate::config::{TestCaseSpec, TestPlan};
use crate::results::collect_results;
use crate::stc::StcApi;
use crate::utils::Timer;

/// Campaign-level tuning knobs
#[derive(Clone, Debug)]
pub struct CampaignOptions {
    /// Root under which per-test-case output directories are created
    pub output_root: PathBuf,

    /// ARP/ND poll interval
    pub arp_interval: Duration,

    /// ARP/ND poll deadline
    pub arp_timeout: Duration,

    /// Sequencer deadline; `None` waits indefinitely
    pub sequencer_timeout: Option<Duration>,

    /// Pause between test cases
    pub inter_case_delay: Duration,
}

impl Default for CampaignOptions {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            arp_interval: Duration::from_secs(5),
            arp_timeout: Duration::from_secs(30),
            sequencer_timeout: None,
            inter_case_delay: Duration::from_secs(15),
        }
    }
}

/// Outcome of one completed test case
#[derive(Clone, Debug)]
pub struct CaseOutcome {
    pub number: usize,
    pub test_name: String,
    pub output_dir: PathBuf,
    pub report_file: String,
    pub duration_ms: u64,
}

/// Summary of a completed campaign
#[derive(Clone, Debug, Default)]
pub struct CampaignReport {
    pub cases: Vec<CaseOutcome>,
}

/// Drives a full campaign against one appliance
pub struct CampaignRunner {
    plan: TestPlan,
    options: CampaignOptions,
}

/// Output directory name for one test case
fn case_dir_name(now: DateTime<Local>, test_name: &str) -> String {
    format!("{}-{}", now.format("%Y-%m-%d %H-%M-%S"), test_name)
}

/// Create the output directory for one test case.
///
/// A name collision (same test name within one second) is an error,
/// not a silent merge that would let a later case overwrite an earlier
/// results database.
fn create_case_dir(
    root: &Path,
    now: DateTime<Local>,
    test_name: &str,
) -> Result<PathBuf, CampaignError> {
    let dir = root.join(case_dir_name(now, test_name));
    std::fs::create_dir(&dir)?;
    Ok(dir)
}

impl CampaignRunner {
    pub fn new(plan: TestPlan, options: CampaignOptions) -> Self {
        Self { plan, options }
    }

    /// Run every test case in plan order.
    ///
    /// The plan is validated before any appliance contact. A failing
    /// case aborts the campaign; subsequent cases are never attempted.
    pub async fn run<C: StcApi>(&self, stc: &mut C) -> Result<CampaignReport, CampaignError> {
        self.plan.validate()?;
        std::fs::create_dir_all(&self.options.output_root)?;

        let total = self.plan.tcc_files.len();
        let mut report = CampaignReport::default();

        for case in self.plan.test_cases().collect::<Vec<_>>() {
            info!(
                "------------------------ starting test case {} of {} ------------------------",
                case.number, total
            );

            match self.run_case(stc, &case).await {
                Ok(outcome) => {
                    info!(
                        "test case {} ({}) done in {}ms",
                        case.number, case.test_name, outcome.duration_ms
                    );
                    report.cases.push(outcome);
                }
                // ARP failures get their cleanup at the point of
                // detection, whether or not that attempt succeeded
                Err(err) if err.cleanup_attempted() => return Err(err),
                Err(err) => return Err(self.cleanup_after(stc, err).await),
            }

            if case.number < total {
                info!(
                    "waiting {:?} before the next test case",
                    self.options.inter_case_delay
                );
                tokio::time::sleep(self.options.inter_case_delay).await;
            }
        }

        Ok(report)
    }

    async fn run_case<C: StcApi>(
        &self,
        stc: &mut C,
        case: &TestCaseSpec,
    ) -> Result<CaseOutcome, CampaignError> {
        let timer = Timer::start(format!("test case {}", case.number));
        let n = case.number;
        let app = CampaignError::appliance(n);

        stc.new_session(
            &self.plan.labserver,
            &self.plan.session_name,
            &self.plan.user_name,
        )
        .await
        .map_err(&app)?;

        stc.config(
            "AutomationOptions",
            &[("LogTo", "stcapi.log"), ("LogLevel", "INFO")],
        )
        .await
        .map_err(&app)?;

        self.ensure_results_profile(stc, n).await?;

        stc.perform("ResetConfigCommand", &[]).await.map_err(&app)?;

        info!("loading TCC configuration {}", case.tcc_file);
        stc.perform(
            "LoadFromDatabaseCommand",
            &[("DatabaseConnectionString", case.tcc_file.as_str())],
        )
        .await
        .map_err(&app)?;

        let project = stc.get("system1", "children-project").await.map_err(&app)?;
        let test_info = stc
            .get(&project, "children-testinfo")
            .await
            .map_err(&app)?;
        info!("test name: {}", case.test_name);
        stc.config(&test_info, &[("TestName", case.test_name.as_str())])
            .await
            .map_err(&app)?;

        let output_dir =
            create_case_dir(&self.options.output_root, Local::now(), &case.test_name)?;

        if self.plan.ipv4_enabled() {
            configure_ipv4(stc, &self.plan, n).await?;
        }
        if self.plan.ipv6_enabled() {
            configure_ipv6(stc, &self.plan, n).await?;
        }

        self.execute_test(stc, n).await?;

        info!(
            "generating report {} from template {}",
            case.report_name, case.template_name
        );
        stc.perform(
            "spirent.results.CreateEnhancedResultsReport",
            &[
                ("ReportTemplateName", case.template_name.as_str()),
                ("FileName", case.report_name.as_str()),
            ],
        )
        .await
        .map_err(&app)?;

        collect_results(stc, &output_dir, n).await?;

        Ok(CaseOutcome {
            number: n,
            test_name: case.test_name.clone(),
            output_dir,
            report_file: case.report_name.clone(),
            duration_ms: timer.stop().as_millis() as u64,
        })
    }

    /// Attach ports, apply, resolve ARP, and run the sequencer.
    async fn execute_test<C: StcApi>(&self, stc: &mut C, case: usize) -> Result<(), CampaignError> {
        let app = CampaignError::appliance(case);

        info!("reserving ports and applying configuration");
        let ports = stc
            .get("system1.project", "children-port")
            .await
            .map_err(&app)?;
        stc.perform(
            "AttachPorts",
            &[("AutoConnect", "true"), ("PortList", ports.as_str())],
        )
        .await
        .map_err(&app)?;
        stc.apply().await.map_err(&app)?;
        info!("configuration applied");

        let poller = ArpPoller::new(self.options.arp_interval, self.options.arp_timeout);
        let state = poller.run(stc).await.map_err(&app)?;

        if state != ArpState::Successful {
            warn!("ARP resolution failed ({state}), disconnecting chassis");
            let original = CampaignError::ArpFailed { case, state };
            if let Err(cleanup) = self.disconnect(stc).await {
                return Err(CampaignError::Cleanup {
                    original: Box::new(original),
                    cleanup,
                });
            }
            return Err(original);
        }

        info!("running command sequencer");
        stc.perform("SequencerStart", &[]).await.map_err(&app)?;
        stc.wait_until_complete(self.options.sequencer_timeout)
            .await
            .map_err(&app)?;
        info!("sequencer finished");

        stc.perform("StopEnhancedResultsTest", &[])
            .await
            .map_err(&app)?;
        Ok(())
    }

    /// Make sure an enhanced-results selector profile exists so the
    /// appliance retains live result data for the report.
    async fn ensure_results_profile<C: StcApi>(
        &self,
        stc: &C,
        case: usize,
    ) -> Result<(), CampaignError> {
        let app = CampaignError::appliance(case);

        let existing = stc
            .get(
                "system1",
                "children-spirent.results.EnhancedResultsSelectorProfile",
            )
            .await
            .map_err(&app)?;

        if existing.trim().is_empty() {
            info!("creating enhanced results selector profile");
            stc.create(
                "spirent.results.EnhancedResultsSelectorProfile",
                "system1",
                &[
                    ("SubscribeType", "ALL"),
                    ("ConfigSubscribeType", "ALL"),
                    ("EnableLiveDataRetention", "true"),
                ],
            )
            .await
            .map_err(&app)?;
        }

        Ok(())
    }

    /// Best-effort appliance cleanup after a campaign failure.
    async fn cleanup_after<C: StcApi>(&self, stc: &mut C, original: CampaignError) -> CampaignError {
        warn!("campaign aborted: {original}; attempting appliance cleanup");

        match self.disconnect(stc).await {
            Ok(()) => original,
            Err(cleanup) => CampaignError::Cleanup {
                original: Box::new(original),
                cleanup,
            },
        }
    }

    async fn disconnect<C: StcApi>(&self, stc: &mut C) -> Result<(), crate::stc::StcError> {
        stc.perform("ChassisDisconnectAll", &[]).await?;
        stc.end_session(true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stc::mock::{Call, MockStc};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn plan_json(cases: usize, ipv4: &str) -> TestPlan {
        let files: Vec<String> = (1..=cases).map(|i| format!("case{i}.tcc")).collect();
        let names: Vec<String> = (1..=cases).map(|i| format!("Test{i}")).collect();
        let templates: Vec<String> = (1..=cases).map(|_| "rfc2544-tpl".to_string()).collect();
        let reports: Vec<String> = (1..=cases).map(|i| format!("report{i}.pdf")).collect();

        let json = serde_json::json!({
            "tcc_configurationfile": files,
            "labserver": "10.10.10.10",
            "TestName": names,
            "TemplateName": templates,
            "ReportName": reports,
            "ipv4": ipv4,
            "port1device1ipv4config": {
                "Address": "192.85.1.3", "Gateway": "192.85.1.1", "Prefix": "24"
            },
            "port2device1ipv4config": {
                "Address": "192.85.2.3", "Gateway": "192.85.2.1", "Prefix": "24"
            }
        });
        serde_json::from_value(json).unwrap()
    }

    fn fast_options(output_root: PathBuf) -> CampaignOptions {
        CampaignOptions {
            output_root,
            arp_interval: Duration::from_millis(1),
            arp_timeout: Duration::from_millis(50),
            sequencer_timeout: None,
            inter_case_delay: Duration::ZERO,
        }
    }

    fn scripted_mock() -> MockStc {
        MockStc::new()
            .with_attr("system1", "children-project", "project1")
            .with_attr("project1", "children-testinfo", "testinfo1")
            .with_attr("system1.project", "children-port", "port1 port2")
            .with_attr("port1", "Location", "//10.0.0.1/1/1")
            .with_attr("port2", "Location", "//10.0.0.1/1/2")
            .with_attr("port1", "AffiliationPort-Sources", "device1")
            .with_attr("port2", "AffiliationPort-Sources", "device2")
            .with_attr("device1", "children-Ipv4If", "ipv4if1")
            .with_attr("device2", "children-Ipv4If", "ipv4if2")
            .with_arp_states(&["SUCCESSFUL"])
    }

    #[test]
    fn test_case_dir_name_format() {
        let now = Local.with_ymd_and_hms(2023, 5, 15, 14, 30, 5).unwrap();
        assert_eq!(
            case_dir_name(now, "Throughput"),
            "2023-05-15 14-30-05-Throughput"
        );
    }

    #[tokio::test]
    async fn test_one_cycle_per_test_case() {
        let dir = tempdir().unwrap();
        let plan = plan_json(2, "False");
        let runner = CampaignRunner::new(plan, fast_options(dir.path().to_path_buf()));
        let mut mock = scripted_mock();

        let report = runner.run(&mut mock).await.unwrap();

        assert_eq!(report.cases.len(), 2);
        assert_eq!(mock.session_count(), 2);
        assert_eq!(mock.perform_count("SequencerStart"), 2);
        assert_eq!(mock.perform_count("LoadFromDatabaseCommand"), 2);
        assert_eq!(mock.perform_count("SaveResult"), 2);

        for outcome in &report.cases {
            assert!(outcome.output_dir.is_dir());
            let name = outcome.output_dir.file_name().unwrap().to_string_lossy();
            assert!(name.ends_with(&format!("-{}", outcome.test_name)));
        }
    }

    #[tokio::test]
    async fn test_ipv4_addressing_runs_before_execution() {
        let dir = tempdir().unwrap();
        let plan = plan_json(1, "True");
        let runner = CampaignRunner::new(plan, fast_options(dir.path().to_path_buf()));
        let mut mock = scripted_mock();

        runner.run(&mut mock).await.unwrap();

        let pushed = mock.configured("ipv4if1");
        assert!(pushed.contains(&("Address".to_string(), "192.85.1.3".to_string())));

        // addressing happens before the ports are attached
        let commands = mock.performed_commands();
        let attach = commands.iter().position(|c| c == "AttachPorts").unwrap();
        let config_pos = mock
            .calls()
            .iter()
            .position(|c| matches!(c, Call::Config { handle, .. } if handle == "ipv4if1"))
            .unwrap();
        let attach_pos = mock
            .calls()
            .iter()
            .position(|c| {
                matches!(c, Call::Perform { command, .. } if command == "AttachPorts")
            })
            .unwrap();
        assert!(config_pos < attach_pos, "commands: {commands:?} {attach}");
    }

    #[tokio::test]
    async fn test_ipv4_skipped_unless_exactly_true() {
        let dir = tempdir().unwrap();
        let plan = plan_json(1, "true");
        let runner = CampaignRunner::new(plan, fast_options(dir.path().to_path_buf()));
        let mut mock = scripted_mock();

        runner.run(&mut mock).await.unwrap();
        assert!(mock.configured("ipv4if1").is_empty());
    }

    #[tokio::test]
    async fn test_arp_failure_never_starts_sequencer() {
        let dir = tempdir().unwrap();
        let plan = plan_json(2, "False");
        let runner = CampaignRunner::new(plan, fast_options(dir.path().to_path_buf()));
        let mut mock = scripted_mock().with_arp_states(&["FAILED"]);

        let err = runner.run(&mut mock).await.unwrap_err();

        assert!(matches!(
            err,
            CampaignError::ArpFailed {
                case: 1,
                state: ArpState::Failed
            }
        ));
        assert_eq!(mock.perform_count("SequencerStart"), 0);
        assert_eq!(mock.perform_count("ChassisDisconnectAll"), 1);
        assert!(mock.calls().contains(&Call::EndSession { terminate: true }));
        // the second test case was never attempted
        assert_eq!(mock.session_count(), 1);
    }

    #[tokio::test]
    async fn test_arp_failure_with_failing_disconnect_is_not_cleaned_up_twice() {
        let dir = tempdir().unwrap();
        let plan = plan_json(2, "False");
        let runner = CampaignRunner::new(plan, fast_options(dir.path().to_path_buf()));
        let mut mock = scripted_mock()
            .with_arp_states(&["FAILED"])
            .fail_on("ChassisDisconnectAll");

        let err = runner.run(&mut mock).await.unwrap_err();

        // both errors surface, and the original is the ARP failure
        // itself rather than another cleanup wrapper
        match err {
            CampaignError::Cleanup { original, .. } => {
                assert!(matches!(
                    *original,
                    CampaignError::ArpFailed {
                        case: 1,
                        state: ArpState::Failed
                    }
                ));
            }
            other => panic!("expected cleanup error, got {other:?}"),
        }
        // the disconnect was attempted exactly once
        assert_eq!(mock.perform_count("ChassisDisconnectAll"), 1);
        assert_eq!(mock.perform_count("SequencerStart"), 0);
        assert_eq!(mock.session_count(), 1);
    }

    #[test]
    fn test_case_dir_collision_is_an_error() {
        let dir = tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2023, 5, 15, 14, 30, 5).unwrap();

        let first = create_case_dir(dir.path(), now, "Throughput").unwrap();
        assert!(first.is_dir());

        // same test name in the same second must not silently reuse
        // the directory of an earlier case
        let err = create_case_dir(dir.path(), now, "Throughput").unwrap_err();
        assert!(matches!(err, CampaignError::Io(_)));
    }

    #[tokio::test]
    async fn test_returns_to_start_dir_and_waits_between_cases() {
        let dir = tempdir().unwrap();
        let plan = plan_json(2, "False");
        let mut options = fast_options(dir.path().to_path_buf());
        options.inter_case_delay = Duration::from_millis(50);
        let runner = CampaignRunner::new(plan, options);
        let mut mock = scripted_mock();

        let start_dir = std::env::current_dir().unwrap();
        let started = std::time::Instant::now();
        runner.run(&mut mock).await.unwrap();

        assert_eq!(std::env::current_dir().unwrap(), start_dir);
        // one inter-case pause for a two-case campaign
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_cases_with_cleanup() {
        let dir = tempdir().unwrap();
        let plan = plan_json(3, "False");
        let runner = CampaignRunner::new(plan, fast_options(dir.path().to_path_buf()));
        let mut mock = scripted_mock().fail_on("SequencerStart");

        let err = runner.run(&mut mock).await.unwrap_err();

        assert!(matches!(err, CampaignError::Appliance { case: 1, .. }));
        // cleanup ran, later cases did not
        assert_eq!(mock.perform_count("ChassisDisconnectAll"), 1);
        assert_eq!(mock.session_count(), 1);
        assert_eq!(mock.perform_count("LoadFromDatabaseCommand"), 1);
    }

    #[tokio::test]
    async fn test_invalid_plan_never_touches_appliance() {
        let dir = tempdir().unwrap();
        let mut plan = plan_json(2, "False");
        plan.report_names.pop();
        let runner = CampaignRunner::new(plan, fast_options(dir.path().to_path_buf()));
        let mut mock = scripted_mock();

        let err = runner.run(&mut mock).await.unwrap_err();

        assert!(matches!(err, CampaignError::Plan(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_results_profile_created_when_absent() {
        let dir = tempdir().unwrap();
        let plan = plan_json(1, "False");
        let runner = CampaignRunner::new(plan, fast_options(dir.path().to_path_buf()));
        let mut mock = scripted_mock();

        runner.run(&mut mock).await.unwrap();

        assert!(mock.calls().iter().any(|c| matches!(
            c,
            Call::Create { object_type, under }
                if object_type == "spirent.results.EnhancedResultsSelectorProfile"
                    && under == "system1"
        )));
    }

    #[tokio::test]
    async fn test_results_profile_reused_when_present() {
        let dir = tempdir().unwrap();
        let plan = plan_json(1, "False");
        let runner = CampaignRunner::new(plan, fast_options(dir.path().to_path_buf()));
        let mut mock = scripted_mock().with_attr(
            "system1",
            "children-spirent.results.EnhancedResultsSelectorProfile",
            "ersp1",
        );

        runner.run(&mut mock).await.unwrap();

        assert!(!mock
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Create { .. })));
    }

    #[tokio::test]
    async fn test_report_generated_with_plan_names() {
        let dir = tempdir().unwrap();
        let plan = plan_json(1, "False");
        let runner = CampaignRunner::new(plan, fast_options(dir.path().to_path_buf()));
        let mut mock = scripted_mock();

        runner.run(&mut mock).await.unwrap();

        let params = mock
            .calls()
            .into_iter()
            .find_map(|c| match c {
                Call::Perform { command, params }
                    if command == "spirent.results.CreateEnhancedResultsReport" =>
                {
                    Some(params)
                }
                _ => None,
            })
            .unwrap();

        assert!(params.contains(&("ReportTemplateName".to_string(), "rfc2544-tpl".to_string())));
        assert!(params.contains(&("FileName".to_string(), "report1.pdf".to_string())));
    }
}
