//! CLI argument parsing, file loading and end-to-end command tests.

use std::fs;
use std::path::Path;

use qrem::{CalibrationKind, CorrectionStrategy, LabelPolicy, OutcomeCounts};
use qrem_cli::commands::{calibrate, common, mitigate, simulate};

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

// ============================================================================
// commands::common tests
// ============================================================================

mod config_loading {
    use super::*;

    #[test]
    fn test_no_path_gives_defaults() {
        let config = common::load_config(None).unwrap();
        assert_eq!(config.strategy, CorrectionStrategy::PseudoInverse);
        assert_eq!(config.label_policy, LabelPolicy::Strict);
    }

    #[test]
    fn test_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mitigation.yaml");
        fs::write(
            &path,
            "strategy: constrained_least_squares\nlabel_policy: lenient\nnegligible_count: 2.5\n",
        )
        .unwrap();

        let config = common::load_config(Some(path_str(&path))).unwrap();
        assert_eq!(config.strategy, CorrectionStrategy::ConstrainedLeastSquares);
        assert_eq!(config.label_policy, LabelPolicy::Lenient);
        assert_eq!(config.negligible_count, 2.5);
        assert_eq!(config.max_qubits, 12);
    }

    #[test]
    fn test_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mitigation.json");
        fs::write(&path, r#"{ "tolerance": 1e-12, "max_qubits": 4 }"#).unwrap();

        let config = common::load_config(Some(path_str(&path))).unwrap();
        assert_eq!(config.tolerance, 1e-12);
        assert_eq!(config.max_qubits, 4);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "tolerance: -1.0\n").unwrap();
        assert!(common::load_config(Some(path_str(&path))).is_err());

        let path = dir.path().join("unknown_mode.yaml");
        fs::write(&path, "strategy: magic\n").unwrap();
        assert!(common::load_config(Some(path_str(&path))).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = common::load_config(Some("/tmp/qrem_test_nonexistent_12345.yaml"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("File not found"));
    }
}

mod calibration_data {
    use super::*;
    use std::collections::BTreeMap;

    fn data(labels: &[&str]) -> common::CalibrationData {
        common::CalibrationData {
            shots: 10,
            preparations: labels
                .iter()
                .map(|l| (l.to_string(), OutcomeCounts::from_pairs([(*l, 10)])))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_width_inferred_from_labels() {
        assert_eq!(data(&["000", "001"]).n_qubits().unwrap(), 3);
    }

    #[test]
    fn test_inconsistent_widths_rejected() {
        assert!(data(&["00", "1"]).n_qubits().is_err());
    }

    #[test]
    fn test_empty_data_rejected() {
        assert!(data(&[]).n_qubits().is_err());
    }

    #[test]
    fn test_shot_mismatches_reported() {
        let mut data = data(&["0", "1"]);
        assert!(data.shot_mismatches().is_empty());

        data.preparations.get_mut("1").unwrap().insert("0", 3);
        assert_eq!(data.shot_mismatches(), vec![("1", 13)]);
    }

    #[test]
    fn test_json_layout() {
        let json = r#"{ "shots": 100, "preparations": { "0": {"0": 95, "1": 5}, "1": {"0": 10, "1": 90} } }"#;
        let parsed: common::CalibrationData = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.shots, 100);
        assert_eq!(parsed.preparations["1"].get("1"), 90);
    }
}

// ============================================================================
// End-to-end: simulate → calibrate → mitigate
// ============================================================================

mod pipeline {
    use super::*;

    #[test]
    fn test_simulate_writes_every_preparation() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("cal.json");
        simulate::execute(2, 0.02, 0.05, 500, 9, path_str(&out)).unwrap();

        let data = common::load_calibration_data(path_str(&out)).unwrap();
        assert_eq!(data.shots, 500);
        assert_eq!(
            data.preparations.keys().collect::<Vec<_>>(),
            ["00", "01", "10", "11"]
        );
        assert!(data.preparations.values().all(|c| c.total_shots() == 500));
    }

    #[test]
    fn test_simulate_rejects_bad_input() {
        assert!(simulate::run(0, 0.1, 0.1, 10, 0).is_err());
        assert!(simulate::run(2, 1.5, 0.1, 10, 0).is_err());
        assert!(simulate::run(2, 0.1, 0.1, 0, 0).is_err());
    }

    #[test]
    fn test_full_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let cal = dir.path().join("cal.json");
        let matrix = dir.path().join("matrix.json");
        let counts = dir.path().join("counts.json");

        simulate::execute(2, 0.03, 0.06, 5000, 21, path_str(&cal)).unwrap();
        calibrate::execute(path_str(&cal), path_str(&matrix), false, None).unwrap();

        let stored = common::load_matrix(path_str(&matrix)).unwrap();
        assert_eq!(stored.kind(), CalibrationKind::Full);
        assert_eq!(stored.shots(), &[5000; 4]);
        assert!(stored.average_fidelity() > 0.85);

        fs::write(&counts, r#"{ "00": 470, "01": 22, "10": 31, "11": 477 }"#).unwrap();
        for mode in ["pseudo-inverse", "constrained"] {
            let mitigated =
                mitigate::run(path_str(&matrix), path_str(&counts), Some(mode), None).unwrap();
            assert_eq!(mitigated.total_shots(), 1000, "{mode}");
            assert!(mitigated.get("00") > 470, "{mode}: {mitigated:?}");
            assert!(mitigated.get("11") > 477, "{mode}: {mitigated:?}");
        }

        mitigate::execute(path_str(&matrix), path_str(&counts), None, None, "json").unwrap();
        assert!(
            mitigate::execute(path_str(&matrix), path_str(&counts), None, None, "xml").is_err()
        );
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let matrix = dir.path().join("matrix.json");
        let counts = dir.path().join("counts.json");
        fs::write(
            &matrix,
            qrem::CalibrationMatrix::from_error_rate(1, 0.05)
                .unwrap()
                .to_json()
                .unwrap(),
        )
        .unwrap();
        fs::write(&counts, r#"{ "0": 60, "1": 40 }"#).unwrap();

        let err = mitigate::run(path_str(&matrix), path_str(&counts), Some("magic"), None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("unsupported correction mode"));
    }

    #[test]
    fn test_lenient_flag_drops_foreign_labels() {
        let dir = tempfile::tempdir().unwrap();
        let cal = dir.path().join("cal.json");
        fs::write(
            &cal,
            r#"{ "shots": 100, "preparations": {
                "0": {"0": 95, "1": 4, "x": 1},
                "1": {"0": 10, "1": 90} } }"#,
        )
        .unwrap();

        let strict = calibrate::resolve_config(None, false).unwrap();
        assert!(calibrate::run(path_str(&cal), &strict).is_err());

        let lenient = calibrate::resolve_config(None, true).unwrap();
        let matrix = calibrate::run(path_str(&cal), &lenient).unwrap();
        assert_eq!(matrix.shots(), &[99, 100]);
    }
}

// ============================================================================
// Clap argument parsing
// ============================================================================

mod clap_parsing {
    use clap::Parser;
    use qrem_cli::cli::{Cli, Commands};

    #[test]
    fn test_parse_mitigate() {
        let cli = Cli::try_parse_from([
            "qrem", "-vv", "mitigate", "--matrix", "m.json", "--counts", "c.json", "--mode",
            "constrained",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Mitigate {
                matrix,
                counts,
                mode,
                config,
                format,
            } => {
                assert_eq!(matrix, "m.json");
                assert_eq!(counts, "c.json");
                assert_eq!(mode.as_deref(), Some("constrained"));
                assert!(config.is_none());
                assert_eq!(format, "table");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_simulate_defaults() {
        let cli = Cli::try_parse_from(["qrem", "simulate", "--qubits", "3", "-o", "cal.json"])
            .unwrap();
        match cli.command {
            Commands::Simulate {
                qubits,
                shots,
                seed,
                ..
            } => {
                assert_eq!(qubits, 3);
                assert_eq!(shots, 8192);
                assert_eq!(seed, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_calibrate_requires_input() {
        assert!(Cli::try_parse_from(["qrem", "calibrate", "--output", "m.json"]).is_err());
    }

    #[test]
    fn test_version() {
        let cli = Cli::try_parse_from(["qrem", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }
}

// ============================================================================
// Package metadata
// ============================================================================

mod metadata {
    #[test]
    fn test_no_repository_claimed() {
        assert_eq!(env!("CARGO_PKG_REPOSITORY"), "");
        assert_eq!(env!("CARGO_PKG_LICENSE"), "Apache-2.0");
        qrem_cli::commands::version::execute();
    }
}
