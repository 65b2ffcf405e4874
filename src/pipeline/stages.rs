// src/pipeline/stages.rs - The five funnel stages as data
use crate::pipeline::context::{Accepted, Row};
use crate::pipeline::extra::Extra;
use crate::pipeline::fields::{is_nonempty_str, is_valid_utm_source, stringify_trimmed, trimmed_or_blank};
use serde_json::Value;

/// Top-level fields copied verbatim into every stage's output.
pub const PASSTHROUGH_FIELDS: &[&str] = &[
    "tm",
    "to_date",
    "user_id",
    "platform",
    "pkg",
    "ver",
    "ip_addr",
    "model",
    "android_id",
    "nickname",
];

/// How an extra field is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRule {
    /// Must be a string with non-blank content
    NonEmptyString,
    /// Any value whose trimmed text is non-blank (numbers accepted)
    NonEmptyValue,
    /// Non-blank string shaped like `source_to_destination`
    UtmSource,
}

/// Outcome of checking one extra field
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Pass(String),
    Missing,
    Empty,
    InvalidFormat(String),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldCheck {
    pub key: &'static str,
    pub rule: CheckRule,
    /// Failing records are dropped; otherwise the check is only counted
    pub required: bool,
    /// Report how many records passed the check
    pub count_nonempty: bool,
}

impl FieldCheck {
    const fn required(key: &'static str, rule: CheckRule) -> Self {
        FieldCheck {
            key,
            rule,
            required: true,
            count_nonempty: false,
        }
    }

    pub fn evaluate(&self, extra: &Extra) -> CheckOutcome {
        let Some(value) = extra.get(self.key) else {
            return CheckOutcome::Missing;
        };

        match self.rule {
            CheckRule::NonEmptyString => match value {
                Value::String(s) if is_nonempty_str(Some(value)) => {
                    CheckOutcome::Pass(s.trim().to_string())
                }
                _ => CheckOutcome::Empty,
            },
            CheckRule::NonEmptyValue => {
                let text = stringify_trimmed(Some(value));
                if text.is_empty() {
                    CheckOutcome::Empty
                } else {
                    CheckOutcome::Pass(text)
                }
            }
            CheckRule::UtmSource => match value {
                Value::String(s) if is_nonempty_str(Some(value)) => {
                    let trimmed = s.trim().to_string();
                    if is_valid_utm_source(Some(value)) {
                        CheckOutcome::Pass(trimmed)
                    } else {
                        CheckOutcome::InvalidFormat(trimmed)
                    }
                }
                _ => CheckOutcome::Empty,
            },
        }
    }
}

/// A histogram or count over the finished output rows
#[derive(Debug, Clone, Copy)]
pub enum Breakdown {
    /// Count rows per distinct value of a column
    By { label: &'static str, column: &'static str },
    /// Same, skipping rows whose value is not a non-blank string
    ByNonEmpty { label: &'static str, column: &'static str },
    /// Number of rows whose value is a non-blank string
    NonEmptyCount { label: &'static str, column: &'static str },
}

/// How accepted records collapse into output rows
#[derive(Debug, Clone, Copy)]
pub enum StageMode {
    /// Project each record, then keep the earliest row per key
    KeepEarliest {
        key: &'static str,
        unique_label: &'static str,
        project: fn(&Accepted) -> Row,
    },
    /// Merge every record of a user into one aggregate row
    MergeByUser,
}

#[derive(Debug, Clone, Copy)]
pub struct StageDefaults {
    pub input: &'static str,
    pub output_csv: &'static str,
    pub output_summary: &'static str,
}

/// Everything that distinguishes one funnel stage from another
#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    /// Subcommand name, also the summary's `stage` value
    pub name: &'static str,
    pub event: &'static str,
    pub require_user_id: bool,
    pub checks: &'static [FieldCheck],
    /// CSV header, in order
    pub columns: &'static [&'static str],
    pub mode: StageMode,
    pub breakdowns: &'static [Breakdown],
    pub defaults: StageDefaults,
}

impl StageSpec {
    pub fn required_checks(&self) -> impl Iterator<Item = &FieldCheck> {
        self.checks.iter().filter(|check| check.required)
    }
}

const UTM_CHECKS: &[FieldCheck] = &[
    FieldCheck::required("utmSource", CheckRule::UtmSource),
    FieldCheck::required("invitationCode", CheckRule::NonEmptyValue),
];

pub const LANDING_LAUNCH: StageSpec = StageSpec {
    name: "step1",
    event: "app_landing_launch",
    require_user_id: false,
    checks: UTM_CHECKS,
    columns: &[
        "invitationCode",
        "utmSource",
        "tm",
        "to_date",
        "platform",
        "device_model",
        "pwa_installed",
        "new_user",
        "device_id",
        "fbclid",
        "user_id",
        "pkg",
        "ver",
        "ip_addr",
        "model",
        "android_id",
        "nickname",
    ],
    mode: StageMode::KeepEarliest {
        key: "invitationCode",
        unique_label: "deduped_unique_invitationCode",
        project: project_landing,
    },
    breakdowns: &[
        Breakdown::By { label: "by_utmSource", column: "utmSource" },
        Breakdown::By { label: "by_platform", column: "platform" },
        Breakdown::By { label: "by_device_model", column: "device_model" },
    ],
    defaults: StageDefaults {
        input: "data/app_landing_launch.json",
        output_csv: "out/step1_app_landing_launch_utmSource_dedup.csv",
        output_summary: "out/step1_app_landing_launch_utmSource_dedup.summary.json",
    },
};

pub const CTA_CLICK: StageSpec = StageSpec {
    name: "step2",
    event: "pwa_cta_click",
    require_user_id: false,
    checks: UTM_CHECKS,
    columns: &[
        "invitationCode",
        "utmSource",
        "button_name",
        "tm",
        "to_date",
        "platform",
        "device_model",
        "pwa_installed",
        "new_user",
        "device_id",
        "fbclid",
        "user_id",
        "pkg",
        "ver",
        "ip_addr",
        "model",
        "android_id",
        "nickname",
    ],
    mode: StageMode::KeepEarliest {
        key: "invitationCode",
        unique_label: "deduped_unique_invitationCode",
        project: project_cta_click,
    },
    breakdowns: &[
        Breakdown::By { label: "by_utmSource", column: "utmSource" },
        Breakdown::By { label: "by_platform", column: "platform" },
        Breakdown::By { label: "by_device_model", column: "device_model" },
        Breakdown::By { label: "by_button_name", column: "button_name" },
    ],
    defaults: StageDefaults {
        input: "data/pwa_cta_click.json",
        output_csv: "out/step2_pwa_cta_click_utmSource_dedup.csv",
        output_summary: "out/step2_pwa_cta_click_utmSource_dedup.summary.json",
    },
};

pub const GUIDE_PAGE_VIEW: StageSpec = StageSpec {
    name: "step3",
    event: "guide_page_view",
    require_user_id: true,
    checks: &[FieldCheck {
        key: "invitation_code",
        rule: CheckRule::NonEmptyString,
        required: true,
        count_nonempty: true,
    }],
    columns: &[
        "user_id",
        "tm",
        "to_date",
        "platform",
        "invitation_code",
        "extra_userId",
        "pkg",
        "ver",
        "ip_addr",
        "model",
        "android_id",
        "nickname",
    ],
    mode: StageMode::KeepEarliest {
        key: "user_id",
        unique_label: "deduped_unique_user_id",
        project: project_page_view,
    },
    breakdowns: &[
        Breakdown::By { label: "by_platform", column: "platform" },
        Breakdown::NonEmptyCount {
            label: "invitation_code_nonempty_count",
            column: "invitation_code",
        },
    ],
    defaults: StageDefaults {
        input: "data/guide_page_view.json",
        output_csv: "out/step3_guide_page_view_dedup_user_id.csv",
        output_summary: "out/step3_guide_page_view_dedup_user_id.summary.json",
    },
};

pub const GUIDE_BIND: StageSpec = StageSpec {
    name: "step4",
    event: "guide_bind",
    require_user_id: true,
    checks: &[],
    columns: &[
        "user_id",
        "first_tm",
        "first_to_date",
        "first_platform",
        "clicked_google_bind",
        "clicked_apple_bind",
        "bind_results",
        "extra_userId",
        "pkg",
        "ver",
        "ip_addr",
        "model",
        "android_id",
        "nickname",
    ],
    mode: StageMode::MergeByUser,
    breakdowns: &[],
    defaults: StageDefaults {
        input: "data/guide_bind.json",
        output_csv: "out/step4_guide_bind_dedup_user_id.csv",
        output_summary: "out/step4_guide_bind_dedup_user_id.summary.json",
    },
};

pub const GUIDE_RESULT: StageSpec = StageSpec {
    name: "step5",
    event: "guide_result",
    require_user_id: true,
    checks: &[FieldCheck {
        key: "guide_result",
        rule: CheckRule::NonEmptyString,
        required: false,
        count_nonempty: false,
    }],
    columns: &[
        "user_id",
        "tm",
        "to_date",
        "platform",
        "guide_result",
        "extra_userId",
        "pkg",
        "ver",
        "ip_addr",
        "model",
        "android_id",
        "nickname",
    ],
    mode: StageMode::KeepEarliest {
        key: "user_id",
        unique_label: "uv_unique_user_id",
        project: project_guide_result,
    },
    breakdowns: &[
        Breakdown::By { label: "by_platform", column: "platform" },
        Breakdown::ByNonEmpty { label: "by_guide_result", column: "guide_result" },
    ],
    defaults: StageDefaults {
        input: "data/guide_result.json",
        output_csv: "out/step5_guide_result_dedup_user_id.csv",
        output_summary: "out/step5_guide_result_dedup_user_id.summary.json",
    },
};

pub const STAGES: &[StageSpec] = &[LANDING_LAUNCH, CTA_CLICK, GUIDE_PAGE_VIEW, GUIDE_BIND, GUIDE_RESULT];

/// Look a stage up by subcommand name (`step3`) or event name (`guide_page_view`).
pub fn stage_by_name(name: &str) -> Option<&'static StageSpec> {
    STAGES
        .iter()
        .find(|stage| stage.name == name || stage.event == name)
}

fn passthrough(accepted: &Accepted) -> Row {
    let mut row = Row::new();
    for &field in PASSTHROUGH_FIELDS {
        row.insert(field.to_string(), accepted.top_field(field));
    }
    row
}

fn project_landing(accepted: &Accepted) -> Row {
    let mut row = passthrough(accepted);
    row.insert(
        "device_id".into(),
        Value::String(stringify_trimmed(accepted.extra.get("device_id"))),
    );
    row.insert("utmSource".into(), accepted.checked("utmSource"));
    for field in ["device_model", "pwa_installed", "new_user", "fbclid"] {
        row.insert(field.into(), accepted.extra_field(field));
    }
    row.insert("invitationCode".into(), accepted.checked("invitationCode"));
    row
}

fn project_cta_click(accepted: &Accepted) -> Row {
    let mut row = project_landing(accepted);
    row.insert("button_name".into(), accepted.extra_field("button_name"));
    row
}

fn project_page_view(accepted: &Accepted) -> Row {
    let mut row = passthrough(accepted);
    row.insert("user_id".into(), Value::String(accepted.user_id.clone()));
    row.insert("invitation_code".into(), accepted.checked("invitation_code"));
    row.insert("extra_userId".into(), accepted.extra_field("userId"));
    row
}

fn project_guide_result(accepted: &Accepted) -> Row {
    let mut row = passthrough(accepted);
    row.insert("user_id".into(), Value::String(accepted.user_id.clone()));
    row.insert(
        "guide_result".into(),
        trimmed_or_blank(accepted.extra.get("guide_result")),
    );
    row.insert("extra_userId".into(), accepted.extra_field("userId"));
    row
}
