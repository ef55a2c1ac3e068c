//! Observation contexts: standing relevance signals derived from
//! uploaded data.
//!
//! One context exists per (user, handler) pair at most; a new upload
//! for the same pair replaces it wholesale. The context keeps a compact
//! summary of the latest burst of records, never unbounded history, and
//! scores itself against queries with a shared formula: keyword match
//! fraction x time decay x data confidence, clamped to [0, 1].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use vital_core::data::DataKind;
use vital_core::response::CoachResponse;

use crate::index::tokenize_ascii;

/// Matched topic keywords saturate the base score at this count.
const KEYWORD_SATURATION: f64 = 2.0;
/// Record count at which confidence reaches 1.0 (a month of daily logs).
const CONFIDENCE_FULL_AT: f64 = 30.0;
/// Any data at all earns at least this much confidence.
const CONFIDENCE_FLOOR: f64 = 0.5;
/// Chart series keep at most this many trailing points.
const SERIES_CAP: usize = 14;

/// Qualitative band for a headline aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellnessBand {
    Poor,
    BelowAverage,
    Average,
    AboveAverage,
    Excellent,
}

impl WellnessBand {
    pub fn label(&self) -> &'static str {
        match self {
            WellnessBand::Poor => "poor",
            WellnessBand::BelowAverage => "below average",
            WellnessBand::Average => "average",
            WellnessBand::AboveAverage => "above average",
            WellnessBand::Excellent => "excellent",
        }
    }
}

/// One dated value in a chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Compact summary of the most recent upload burst for one data kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataSummary {
    pub record_count: usize,
    pub latest_date: Option<NaiveDate>,
    /// Derived aggregates keyed by stable names ("avg_sleep_hours", ...)
    pub aggregates: BTreeMap<String, f64>,
    /// Headline metric over time, oldest first, bounded
    pub series: Vec<SeriesPoint>,
}

/// Standing relevance signal for one (user, handler, data-kind).
#[derive(Debug, Clone, Serialize)]
pub struct ObservationContext {
    pub handler: String,
    pub user_id: String,
    pub kind: DataKind,
    /// Last relevancy computed against a query
    pub relevancy: f64,
    /// Confidence in the underlying data, from record count
    pub confidence: f64,
    pub updated_at: DateTime<Utc>,
    pub summary: DataSummary,
}

impl ObservationContext {
    pub fn new(handler: impl Into<String>, user_id: impl Into<String>, kind: DataKind) -> Self {
        Self {
            handler: handler.into(),
            user_id: user_id.into(),
            kind,
            relevancy: 0.0,
            confidence: 0.0,
            updated_at: Utc::now(),
            summary: DataSummary::default(),
        }
    }

    /// Ingest the records under this kind's payload key. A payload
    /// without that key is "no new data": nothing changes, not even the
    /// update timestamp. Returns how many records were seen.
    pub fn update_from_data(&mut self, payload: &Value, now: DateTime<Utc>) -> usize {
        let Some(records) = payload.get(self.kind.payload_key()).and_then(Value::as_array)
        else {
            return 0;
        };

        self.summary = summarize(self.kind, records);
        self.confidence = confidence_from_count(self.summary.record_count);
        self.updated_at = now;
        self.summary.record_count
    }

    /// Relevancy of this context to `query` at time `now`:
    /// `matched/2 (capped 1.0) x 0.5^(age/half_life) x confidence`.
    /// Monotone in the matched keyword set, monotone decreasing in age.
    pub fn calculate_relevancy(&self, query: &str, now: DateTime<Utc>, half_life_secs: f64) -> f64 {
        let tokens = tokenize_ascii(query);
        let matched = self
            .kind
            .topic_keywords()
            .iter()
            .filter(|kw| tokens.iter().any(|t| t == *kw))
            .count();

        let base = (matched as f64 / KEYWORD_SATURATION).min(1.0);
        let elapsed = now
            .signed_duration_since(self.updated_at)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;
        (base * decay_multiplier(elapsed, half_life_secs) * self.confidence).clamp(0.0, 1.0)
    }

    /// Templated answer straight from the stored summary. Deterministic:
    /// the same summary always yields the same envelope.
    pub fn generate_response(&self) -> CoachResponse {
        let s = &self.summary;
        if s.record_count == 0 {
            return CoachResponse::text(format!(
                "I don't have any {} data for you yet. Upload some records and I can take a look.",
                self.kind
            ));
        }

        let (text, insights, recommendations, questions, chart_title) = match self.kind {
            DataKind::Sleep => sleep_report(s),
            DataKind::Exercise => exercise_report(s),
            DataKind::Nutrition => nutrition_report(s),
            DataKind::Biometric => biometric_report(s),
        };

        CoachResponse {
            response: text,
            insights,
            visualization: chart(chart_title, &s.series),
            error: None,
            recommendations,
            questions,
            metrics: None,
            total_score: None,
        }
    }
}

/// `0` records score 0; otherwise count/30 with a 0.5 floor and 1.0 cap.
pub fn confidence_from_count(count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        (count as f64 / CONFIDENCE_FULL_AT).clamp(CONFIDENCE_FLOOR, 1.0)
    }
}

/// Exponential half-life decay: 1.0 at zero age, 0.5 after one
/// half-life, strictly decreasing in between.
pub fn decay_multiplier(elapsed_secs: f64, half_life_secs: f64) -> f64 {
    if half_life_secs <= 0.0 {
        return 1.0;
    }
    0.5_f64.powf(elapsed_secs.max(0.0) / half_life_secs)
}

fn summarize(kind: DataKind, records: &[Value]) -> DataSummary {
    let mut summary = DataSummary {
        record_count: records.len(),
        ..DataSummary::default()
    };

    match kind {
        DataKind::Sleep => {
            if let Some(avg) = average(records, &["sleep_hours", "duration"]) {
                summary.aggregates.insert("avg_sleep_hours".into(), avg);
            }
            summary.series = series(records, &["sleep_hours", "duration"]);
        }
        DataKind::Exercise => {
            if let Some(avg) = average(records, &["active_calories", "calories"]) {
                summary.aggregates.insert("avg_active_calories".into(), avg);
            }
            summary.series = series(records, &["active_calories", "calories"]);
        }
        DataKind::Nutrition => {
            if let Some(avg) = average(records, &["calories"]) {
                summary.aggregates.insert("avg_calories".into(), avg);
            }
            for (field, key) in [
                ("protein_pct", "avg_protein_pct"),
                ("carbs_pct", "avg_carbs_pct"),
                ("fat_pct", "avg_fat_pct"),
            ] {
                if let Some(avg) = average(records, &[field]) {
                    summary.aggregates.insert(key.into(), avg);
                }
            }
            summary.series = series(records, &["calories"]);
        }
        DataKind::Biometric => {
            for (field, key) in [
                ("systolic", "avg_systolic"),
                ("diastolic", "avg_diastolic"),
                ("resting_heart_rate", "avg_resting_heart_rate"),
                ("body_fat_pct", "avg_body_fat_pct"),
            ] {
                if let Some(avg) = average(records, &[field]) {
                    summary.aggregates.insert(key.into(), avg);
                }
            }
            if let Some(weight) = latest_value(records, &["weight"]) {
                summary.aggregates.insert("latest_weight".into(), weight);
            }
            summary.series = series(records, &["weight"]);
        }
    }

    summary.latest_date = records.iter().filter_map(record_date).max();
    summary
}

fn num_field(record: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| record.get(*key)?.as_f64())
}

fn record_date(record: &Value) -> Option<NaiveDate> {
    let raw = record.get("date")?.as_str()?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn average(records: &[Value], keys: &[&str]) -> Option<f64> {
    let values: Vec<f64> = records.iter().filter_map(|r| num_field(r, keys)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Value from the most recently dated record carrying one of `keys`,
/// falling back to the last such record in upload order.
fn latest_value(records: &[Value], keys: &[&str]) -> Option<f64> {
    records
        .iter()
        .filter_map(|r| num_field(r, keys).map(|v| (record_date(r), v)))
        .max_by_key(|(date, _)| *date)
        .map(|(_, v)| v)
}

fn series(records: &[Value], keys: &[&str]) -> Vec<SeriesPoint> {
    let mut points: Vec<SeriesPoint> = records
        .iter()
        .filter_map(|r| {
            Some(SeriesPoint {
                date: record_date(r)?,
                value: num_field(r, keys)?,
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    if points.len() > SERIES_CAP {
        points.drain(..points.len() - SERIES_CAP);
    }
    points
}

fn chart(title: &str, series: &[SeriesPoint]) -> Option<Value> {
    if series.is_empty() {
        return None;
    }
    let labels: Vec<String> = series.iter().map(|p| p.date.to_string()).collect();
    let values: Vec<f64> = series.iter().map(|p| p.value).collect();
    Some(json!({
        "type": "line_chart",
        "title": title,
        "labels": labels,
        "values": values,
    }))
}

fn window_text(summary: &DataSummary, noun: &str) -> String {
    match summary.latest_date {
        Some(date) => format!(
            "You've logged {} {} record(s) through {}.",
            summary.record_count, noun, date
        ),
        None => format!("You've logged {} {} record(s).", summary.record_count, noun),
    }
}

pub fn sleep_band(avg_hours: f64) -> WellnessBand {
    if avg_hours < 5.0 {
        WellnessBand::Poor
    } else if avg_hours < 6.0 {
        WellnessBand::BelowAverage
    } else if avg_hours < 7.0 {
        WellnessBand::Average
    } else if avg_hours < 8.0 {
        WellnessBand::AboveAverage
    } else {
        WellnessBand::Excellent
    }
}

pub fn exercise_band(avg_active_calories: f64) -> WellnessBand {
    if avg_active_calories < 200.0 {
        WellnessBand::Poor
    } else if avg_active_calories < 300.0 {
        WellnessBand::BelowAverage
    } else if avg_active_calories < 400.0 {
        WellnessBand::Average
    } else if avg_active_calories < 500.0 {
        WellnessBand::AboveAverage
    } else {
        WellnessBand::Excellent
    }
}

type Report = (String, Vec<String>, Vec<String>, Vec<String>, &'static str);

fn sleep_report(s: &DataSummary) -> Report {
    let mut text = window_text(s, "sleep");
    let mut insights = Vec::new();
    let mut recommendations = Vec::new();

    if let Some(avg) = s.aggregates.get("avg_sleep_hours").copied() {
        let band = sleep_band(avg);
        text.push_str(&format!(" Average sleep: {avg:.1} hours."));
        insights.push(format!("Your average sleep duration is {avg:.1} hours."));
        insights.push(format!("Your sleep duration is {}.", band.label()));
        if avg < 7.0 {
            insights.push("Your sleep duration is below the recommended 7-9 hours.".into());
        }
        recommendations = match band {
            WellnessBand::Poor | WellnessBand::BelowAverage => vec![
                "Try moving bedtime 30 minutes earlier.".into(),
                "Keep a consistent sleep schedule, including weekends.".into(),
            ],
            WellnessBand::Average => vec![
                "Aim for a consistent 7-8 hours.".into(),
                "Review your evening routine for easy wins.".into(),
            ],
            _ => vec![
                "Keep up your current sleep habits.".into(),
                "Watch daytime energy to confirm your sleep is restorative.".into(),
            ],
        };
    }

    let questions = vec![
        "Do you feel rested when you wake up?".into(),
        "Would you like to work on sleep quality or duration?".into(),
    ];
    (text, insights, recommendations, questions, "Sleep hours")
}

fn exercise_report(s: &DataSummary) -> Report {
    let mut text = window_text(s, "workout");
    let mut insights = Vec::new();
    let mut recommendations = Vec::new();

    if let Some(avg) = s.aggregates.get("avg_active_calories").copied() {
        let band = exercise_band(avg);
        text.push_str(&format!(" Average active calories: {avg:.0}."));
        insights.push(format!("Your average active energy burn is {avg:.0} calories."));
        insights.push(format!("Your activity level is {}.", band.label()));
        if avg < 400.0 {
            insights.push(
                "Your active calorie burn is below the 400-500 range most adults benefit from."
                    .into(),
            );
        }
        recommendations = match band {
            WellnessBand::Poor | WellnessBand::BelowAverage => vec![
                "Add a short daily walk to lift your baseline burn.".into(),
                "Schedule two or three structured workouts per week.".into(),
            ],
            WellnessBand::Average => vec![
                "Mix in higher-intensity intervals once a week.".into(),
                "Keep your current routine consistent.".into(),
            ],
            _ => vec![
                "Maintain your training load and prioritize recovery.".into(),
                "Rotate intensity to avoid overuse.".into(),
            ],
        };
    }

    let questions = vec![
        "What kinds of workouts do you enjoy most?".into(),
        "Is any soreness or fatigue limiting your activity?".into(),
    ];
    (text, insights, recommendations, questions, "Active calories")
}

fn nutrition_report(s: &DataSummary) -> Report {
    let mut text = window_text(s, "nutrition");
    let mut insights = Vec::new();
    let mut recommendations = Vec::new();

    if let Some(avg) = s.aggregates.get("avg_calories").copied() {
        text.push_str(&format!(" Average intake: {avg:.0} calories."));
        if avg < 1200.0 {
            insights.push(format!(
                "Your average intake of {avg:.0} calories is below recommended levels."
            ));
            recommendations
                .push("Increase intake toward at least 1200-1500 calories per day.".into());
        } else if avg > 3000.0 {
            insights.push(format!(
                "Your average intake of {avg:.0} calories is above recommended levels."
            ));
            recommendations.push("Bring intake back toward 2000-2500 calories per day.".into());
        } else {
            insights.push(format!(
                "Your average intake of {avg:.0} calories is within a reasonable range."
            ));
        }
    }

    let mut macros_flagged = false;
    for (key, name, low, high) in [
        ("avg_protein_pct", "protein", 10.0, 35.0),
        ("avg_carbs_pct", "carbohydrate", 45.0, 65.0),
        ("avg_fat_pct", "fat", 20.0, 35.0),
    ] {
        if let Some(pct) = s.aggregates.get(key).copied() {
            if pct < low {
                insights.push(format!(
                    "Your {name} intake ({pct:.1}% of calories) is below the {low:.0}-{high:.0}% range."
                ));
                macros_flagged = true;
            } else if pct > high {
                insights.push(format!(
                    "Your {name} intake ({pct:.1}% of calories) is above the {low:.0}-{high:.0}% range."
                ));
                macros_flagged = true;
            }
        }
    }
    if !macros_flagged && s.aggregates.contains_key("avg_protein_pct") {
        insights.push("Your macro split looks balanced.".into());
    }
    if s
        .aggregates
        .get("avg_protein_pct")
        .is_some_and(|p| *p < 10.0)
    {
        recommendations.push("Add a protein source to each meal.".into());
    }

    let questions = vec![
        "How consistent is your meal schedule?".into(),
        "Do you want a macro target to aim for?".into(),
    ];
    (text, insights, recommendations, questions, "Calories")
}

fn biometric_report(s: &DataSummary) -> Report {
    let mut text = window_text(s, "biometric");
    let mut insights = Vec::new();
    let mut recommendations = Vec::new();

    if let Some(weight) = s.aggregates.get("latest_weight").copied() {
        text.push_str(&format!(" Latest weight: {weight:.1}."));
    }

    if let (Some(sys), Some(dia)) = (
        s.aggregates.get("avg_systolic").copied(),
        s.aggregates.get("avg_diastolic").copied(),
    ) {
        let verdict = if sys < 90.0 || dia < 60.0 {
            "on the low side"
        } else if sys < 120.0 && dia < 80.0 {
            "in the optimal range"
        } else if sys < 130.0 && dia < 80.0 {
            "slightly elevated"
        } else if sys < 140.0 || dia < 90.0 {
            "in the high-normal range"
        } else {
            "high; consider discussing it with a clinician"
        };
        insights.push(format!(
            "Your average blood pressure of {sys:.0}/{dia:.0} is {verdict}."
        ));
        if sys >= 130.0 || dia >= 80.0 {
            recommendations
                .push("Regular cardio can improve blood pressure over time.".into());
        }
    }

    if let Some(hr) = s.aggregates.get("avg_resting_heart_rate").copied() {
        let verdict = if hr < 60.0 {
            "excellent"
        } else if hr < 70.0 {
            "good"
        } else if hr < 80.0 {
            "average"
        } else if hr < 90.0 {
            "below average"
        } else {
            "poor"
        };
        insights.push(format!("Your average resting heart rate of {hr:.0} is {verdict}."));
        if hr >= 80.0 {
            recommendations
                .push("Consistent aerobic training helps lower resting heart rate.".into());
        }
    }

    if let Some(bf) = s.aggregates.get("avg_body_fat_pct").copied() {
        let verdict = if bf < 8.0 {
            "very low"
        } else if bf < 15.0 {
            "athletic"
        } else if bf < 20.0 {
            "fit"
        } else if bf < 25.0 {
            "average"
        } else if bf < 30.0 {
            "above average"
        } else {
            "high"
        };
        insights.push(format!("Your average body fat of {bf:.1}% is {verdict}."));
    }

    if recommendations.is_empty() {
        recommendations.push("Keep tracking to build a reliable trend.".into());
    }

    let questions = vec!["Were these readings taken at a consistent time of day?".into()];
    (text, insights, recommendations, questions, "Weight")
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;
    use vital_core::data::DataKind;

    use super::*;

    const HALF_LIFE: f64 = 21_600.0;

    fn sleep_context_with(records: Value) -> ObservationContext {
        let mut ctx = ObservationContext::new("metrics", "u1", DataKind::Sleep);
        ctx.update_from_data(&json!({ "sleep_data": records }), Utc::now());
        ctx
    }

    #[test]
    fn update_without_payload_key_is_a_no_op() {
        let mut ctx = ObservationContext::new("metrics", "u1", DataKind::Sleep);
        let before = ctx.updated_at;
        let seen = ctx.update_from_data(&json!({ "exercise_data": [] }), Utc::now());
        assert_eq!(seen, 0);
        assert_eq!(ctx.updated_at, before);
        assert_eq!(ctx.confidence, 0.0);
    }

    #[test]
    fn update_with_empty_records_zeroes_confidence() {
        let ctx = sleep_context_with(json!([]));
        assert_eq!(ctx.summary.record_count, 0);
        assert_eq!(ctx.confidence, 0.0);
    }

    #[test]
    fn confidence_has_floor_and_cap() {
        assert_eq!(confidence_from_count(0), 0.0);
        assert_eq!(confidence_from_count(1), 0.5);
        assert_eq!(confidence_from_count(30), 1.0);
        assert_eq!(confidence_from_count(90), 1.0);
    }

    #[test]
    fn decay_is_monotone_decreasing() {
        assert_eq!(decay_multiplier(0.0, HALF_LIFE), 1.0);
        let after_half_life = decay_multiplier(HALF_LIFE, HALF_LIFE);
        assert!((after_half_life - 0.5).abs() < 1e-9);
        assert!(decay_multiplier(100.0, HALF_LIFE) > decay_multiplier(200.0, HALF_LIFE));
    }

    #[test]
    fn relevancy_is_monotone_in_matched_keywords() {
        let ctx = sleep_context_with(json!([
            {"date": "2023-01-01", "sleep_hours": 7.5}
        ]));
        let now = Utc::now();
        let one = ctx.calculate_relevancy("how is my sleep", now, HALF_LIFE);
        let two = ctx.calculate_relevancy("how is my sleep and rest", now, HALF_LIFE);
        assert!(two >= one);
        assert!(one > 0.0);
    }

    #[test]
    fn relevancy_is_zero_without_topic_keywords() {
        let ctx = sleep_context_with(json!([
            {"date": "2023-01-01", "sleep_hours": 7.5}
        ]));
        let score = ctx.calculate_relevancy("zzqxv randomnoise", Utc::now(), HALF_LIFE);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn fresher_context_outscores_staler_one() {
        let mut fresh = sleep_context_with(json!([
            {"date": "2023-01-01", "sleep_hours": 6.0}
        ]));
        let mut stale = fresh.clone();
        let now = Utc::now();
        fresh.updated_at = now;
        stale.updated_at = now - Duration::hours(3);

        let query = "how is my sleep";
        assert!(
            fresh.calculate_relevancy(query, now, HALF_LIFE)
                > stale.calculate_relevancy(query, now, HALF_LIFE)
        );
    }

    #[test]
    fn sleep_report_flags_short_sleep() {
        let ctx = sleep_context_with(json!([
            {"date": "2023-01-01", "sleep_hours": 5.5},
            {"date": "2023-01-02", "sleep_hours": 5.5}
        ]));
        let resp = ctx.generate_response();
        assert!(resp.error.is_none());
        assert!(
            resp.insights
                .iter()
                .any(|i| i.contains("below the recommended"))
        );
        assert!(!resp.recommendations.is_empty());
        assert!(resp.visualization.is_some());
    }

    #[test]
    fn generate_response_is_deterministic() {
        let ctx = sleep_context_with(json!([
            {"date": "2023-01-01", "sleep_hours": 7.5}
        ]));
        assert_eq!(ctx.generate_response(), ctx.generate_response());
    }

    #[test]
    fn exercise_records_do_not_feed_a_sleep_context() {
        let mut ctx = ObservationContext::new("metrics", "u1", DataKind::Sleep);
        let seen = ctx.update_from_data(
            &json!({ "exercise_data": [{"date": "2023-01-01", "active_calories": 450}] }),
            Utc::now(),
        );
        assert_eq!(seen, 0);
        assert!(ctx.summary.aggregates.is_empty());
    }

    #[test]
    fn nutrition_report_flags_macro_imbalance() {
        let mut ctx = ObservationContext::new("metrics", "u1", DataKind::Nutrition);
        ctx.update_from_data(
            &json!({ "nutrition_data": [
                {"date": "2023-01-01", "calories": 2000, "protein_pct": 5.0, "carbs_pct": 55.0, "fat_pct": 30.0}
            ]}),
            Utc::now(),
        );
        let resp = ctx.generate_response();
        assert!(resp.insights.iter().any(|i| i.contains("protein")));
        assert!(
            resp.recommendations
                .iter()
                .any(|r| r.contains("protein source"))
        );
    }

    #[test]
    fn biometric_report_reads_blood_pressure_bands() {
        let mut ctx = ObservationContext::new("metrics", "u1", DataKind::Biometric);
        ctx.update_from_data(
            &json!({ "biometric_data": [
                {"date": "2023-01-01", "weight": 80.5, "systolic": 118, "diastolic": 76}
            ]}),
            Utc::now(),
        );
        let resp = ctx.generate_response();
        assert!(resp.response.contains("Latest weight: 80.5"));
        assert!(resp.insights.iter().any(|i| i.contains("optimal range")));
    }

    #[test]
    fn series_is_sorted_and_bounded() {
        let records: Vec<Value> = (1..=20)
            .map(|day| json!({"date": format!("2023-01-{day:02}"), "sleep_hours": 7.0}))
            .collect();
        let ctx = sleep_context_with(Value::Array(records));
        assert_eq!(ctx.summary.series.len(), 14);
        assert!(
            ctx.summary
                .series
                .windows(2)
                .all(|w| w[0].date <= w[1].date)
        );
        assert_eq!(
            ctx.summary.latest_date,
            NaiveDate::from_ymd_opt(2023, 1, 20)
        );
    }

    #[test]
    fn empty_summary_yields_upload_prompt() {
        let ctx = ObservationContext::new("metrics", "u1", DataKind::Exercise);
        let resp = ctx.generate_response();
        assert!(resp.response.contains("exercise"));
        assert!(resp.insights.is_empty());
        assert!(resp.visualization.is_none());
    }
}
