//! Step registry: where each manufacturing step's attempt rows live
//!
//! A step type maps to one or more physical tables. The registry is static data
//! built once; nothing outside this module branches on step-type strings.

use mes_common::Origin;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Shared table holding most stations' results, discriminated by `step_type_no`
pub const PRODUCTION_RESULT_TABLE: &str = "mo_process_step_production_result";

/// Physical location of one step's attempt rows.
///
/// Identifiers and expressions are trusted SQL fragments; expressions refer to
/// the step table through the alias `s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    pub table: &'static str,
    /// Column compared against the requested date range
    pub time_column: &'static str,
    /// Column holding the unit's serial number
    pub serial_column: &'static str,
    pub result_expr: &'static str,
    pub reason_expr: &'static str,
    pub start_expr: &'static str,
    pub end_expr: &'static str,
    pub station_expr: &'static str,
    /// `step_type_no` value for tables shared between steps
    pub step_type_no: Option<&'static str>,
}

impl StepDescriptor {
    /// Row set of `step_type_no` inside the shared production-result table
    pub const fn production_result(step_type_no: &'static str) -> Self {
        Self {
            table: PRODUCTION_RESULT_TABLE,
            time_column: "add_time",
            serial_column: "product_sn",
            result_expr: "s.error_code",
            reason_expr: "s.ng_reason",
            start_expr: "s.start_time",
            end_expr: "s.end_time",
            station_expr: "s.station_num",
            step_type_no: Some(step_type_no),
        }
    }

    pub const fn calibration() -> Self {
        Self {
            table: "mo_calibration",
            time_column: "start_time",
            serial_column: "camera_sn",
            result_expr: "s.error_code",
            reason_expr: "NULL",
            start_expr: "s.start_time",
            end_expr: "s.end_time",
            station_expr: "NULL",
            step_type_no: None,
        }
    }

    /// Legacy final check table: pass flag instead of an error code, the raw
    /// error code travels as the failure reason
    pub const fn final_check() -> Self {
        Self {
            table: "mo_final_check",
            time_column: "start_time",
            serial_column: "camera_sn",
            result_expr: "CASE WHEN s.check_result IS NULL THEN NULL \
                          WHEN s.check_result THEN 0 ELSE 1 END",
            reason_expr: "CAST(s.error_code AS TEXT)",
            start_expr: "s.start_time",
            end_expr: "s.end_time",
            station_expr: "NULL",
            step_type_no: None,
        }
    }
}

/// How raw failure codes turn into human-readable reasons
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonSource {
    /// Trimmed raw reason text
    Raw,
    /// `error_descriptions` lookup for a procedure, keyed by result code
    ProcedureCodes {
        procedure: &'static str,
        /// Codes longer than one character drop their first character before lookup
        strip_leading: bool,
        /// Only rows from this station are translated; others keep their raw reason
        station: Option<i64>,
    },
    /// `mo_error_desc` lookup for stage FQC, keyed by the raw reason; unmapped → empty
    FinalCheckCodes,
    /// Remote MES attribute-label service
    RemoteAttrLabels,
}

/// Registry entry for one step type
#[derive(Debug, Clone)]
pub struct StepEntry {
    pub label: &'static str,
    pub descriptors: Vec<StepDescriptor>,
    pub reasons: ReasonSource,
    /// Origin-specific reason sources (different station vendors per site)
    pub origin_reasons: Vec<(Origin, ReasonSource)>,
}

impl StepEntry {
    fn new(label: &'static str, descriptors: Vec<StepDescriptor>, reasons: ReasonSource) -> Self {
        Self {
            label,
            descriptors,
            reasons,
            origin_reasons: Vec::new(),
        }
    }

    fn with_origin_reasons(mut self, origin: Origin, reasons: ReasonSource) -> Self {
        self.origin_reasons.push((origin, reasons));
        self
    }

    /// Reason source for an origin
    pub fn reason_source(&self, origin: Option<Origin>) -> &ReasonSource {
        origin
            .and_then(|o| {
                self.origin_reasons
                    .iter()
                    .find(|(candidate, _)| *candidate == o)
            })
            .map(|(_, source)| source)
            .unwrap_or(&self.reasons)
    }
}

/// Catalog line for one registered step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepInfo {
    pub step_type: String,
    pub label: &'static str,
    pub tables: Vec<&'static str>,
}

/// Step-type key → entry
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    entries: HashMap<String, StepEntry>,
}

static BUILTIN: Lazy<StepRegistry> = Lazy::new(StepRegistry::build_builtin);

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry of the plant's steps
    pub fn builtin() -> &'static StepRegistry {
        &BUILTIN
    }

    pub fn register(&mut self, step_type: impl Into<String>, entry: StepEntry) {
        self.entries.insert(step_type.into(), entry);
    }

    pub fn entry(&self, step_type: &str) -> Option<&StepEntry> {
        self.entries.get(step_type.trim())
    }

    /// Tables to read for a step; empty for unknown step types
    pub fn descriptors_for(&self, step_type: &str) -> &[StepDescriptor] {
        self.entry(step_type)
            .map(|e| e.descriptors.as_slice())
            .unwrap_or(&[])
    }

    /// Known step types, sorted
    pub fn step_types(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Every registered step with its label and source tables, sorted by step type
    pub fn catalog(&self) -> Vec<StepInfo> {
        self.step_types()
            .into_iter()
            .filter_map(|step| {
                let entry = self.entries.get(step)?;
                Some(StepInfo {
                    step_type: step.to_string(),
                    label: entry.label,
                    tables: entry.descriptors.iter().map(|d| d.table).collect(),
                })
            })
            .collect()
    }

    fn build_builtin() -> Self {
        use StepDescriptor as D;

        let mut registry = Self::new();

        let generic: [(&'static str, &'static str); 11] = [
            ("000", "脏污检测"),
            ("001", "UV点胶"),
            ("011", "横梁外观检测"),
            ("012", "镭雕&检查"),
            ("013", "横梁密封胶涂布"),
            ("014", "CMOS外观检测"),
            ("015", "撕膜清洁"),
            ("016", "CMOS螺丝锁付"),
            ("017", "高温固化"),
            ("018", "AA后综合检测"),
            ("019", "AA后涂布"),
        ];
        for (step, label) in generic {
            registry.register(
                step,
                StepEntry::new(label, vec![D::production_result(step)], ReasonSource::Raw),
            );
        }

        registry.register(
            "002",
            StepEntry::new(
                "自动调焦",
                vec![D::production_result("002")],
                ReasonSource::RemoteAttrLabels,
            )
            .with_origin_reasons(
                Origin::Mianyang,
                ReasonSource::ProcedureCodes {
                    procedure: "AA",
                    strip_leading: false,
                    station: Some(7),
                },
            ),
        );

        registry.register(
            "020",
            StepEntry::new(
                "标定",
                vec![D::calibration()],
                ReasonSource::ProcedureCodes {
                    procedure: "calibration",
                    strip_leading: true,
                    station: None,
                },
            ),
        );

        // Final inspection is split across the legacy check table and the shared result table
        registry.register(
            "FQC",
            StepEntry::new(
                "终检",
                vec![
                    D::final_check(),
                    StepDescriptor {
                        reason_expr: "CAST(s.error_code AS TEXT)",
                        ..D::production_result("FQC")
                    },
                ],
                ReasonSource::FinalCheckCodes,
            ),
        );

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_step_has_no_descriptors() {
        assert!(StepRegistry::builtin().descriptors_for("999").is_empty());
        assert!(StepRegistry::builtin().entry("").is_none());
    }

    #[test]
    fn test_single_table_step() {
        let descriptors = StepRegistry::builtin().descriptors_for("020");
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].table, "mo_calibration");
        assert_eq!(descriptors[0].serial_column, "camera_sn");
    }

    #[test]
    fn test_final_inspection_spans_two_tables() {
        let descriptors = StepRegistry::builtin().descriptors_for("FQC");
        let tables: Vec<_> = descriptors.iter().map(|d| d.table).collect();
        assert_eq!(tables, vec!["mo_final_check", PRODUCTION_RESULT_TABLE]);
        assert_eq!(descriptors[1].step_type_no, Some("FQC"));
    }

    #[test]
    fn test_shared_table_steps_carry_their_step_number() {
        let registry = StepRegistry::builtin();
        for step in ["000", "002", "013", "019"] {
            let descriptors = registry.descriptors_for(step);
            assert_eq!(descriptors.len(), 1, "step {}", step);
            assert_eq!(descriptors[0].step_type_no, Some(step));
        }
    }

    #[test]
    fn test_reason_source_depends_on_origin() {
        let entry = StepRegistry::builtin().entry("002").unwrap();
        assert_eq!(entry.reason_source(None), &ReasonSource::RemoteAttrLabels);
        assert_eq!(
            entry.reason_source(Some(Origin::Suzhou)),
            &ReasonSource::RemoteAttrLabels
        );
        assert!(matches!(
            entry.reason_source(Some(Origin::Mianyang)),
            ReasonSource::ProcedureCodes { procedure: "AA", station: Some(7), .. }
        ));
    }

    #[test]
    fn test_step_type_lookup_trims() {
        assert_eq!(StepRegistry::builtin().descriptors_for(" 020 ").len(), 1);
    }

    #[test]
    fn test_step_types_sorted() {
        let steps = StepRegistry::builtin().step_types();
        let mut sorted = steps.clone();
        sorted.sort_unstable();
        assert_eq!(steps, sorted);
        assert!(steps.contains(&"FQC"));
    }

    #[test]
    fn test_catalog_lists_labels_and_tables() {
        let catalog = StepRegistry::builtin().catalog();
        assert_eq!(catalog.len(), StepRegistry::builtin().step_types().len());

        let calibration = catalog.iter().find(|s| s.step_type == "020").unwrap();
        assert_eq!(calibration.label, "标定");
        assert_eq!(calibration.tables, vec!["mo_calibration"]);

        let final_check = catalog.iter().find(|s| s.step_type == "FQC").unwrap();
        assert_eq!(final_check.tables, vec!["mo_final_check", PRODUCTION_RESULT_TABLE]);
    }
}
