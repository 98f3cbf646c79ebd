// rust/event-core/src/pipeline/stage.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AnalysisError, Result};
use crate::events::{EventRecord, EventSource};

use super::context::{EventContext, FieldKind, FieldSpec, FieldValue};

/// A per-event feature extractor.
///
/// A stage is created for one work unit, set up once before the pass,
/// called for every event in order and torn down after the pass.
pub trait Stage: Send {
    fn name(&self) -> &str;

    /// Fields this stage reads from the context.
    fn requires(&self) -> Vec<FieldSpec>;

    /// Fields this stage writes into the context.
    fn provides(&self) -> Vec<FieldSpec>;

    fn setup(&mut self, _source: &EventSource) -> Result<()> {
        Ok(())
    }

    fn process(&mut self, record: &EventRecord<'_>, ctx: &mut EventContext) -> Result<()>;

    fn teardown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Description of a stage, as found in the analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageSpec {
    /// Parses the record as a JSON object and publishes `fields`.
    Decode { fields: Vec<FieldSpec> },
    /// Zeroes elements of `input` below `min`.
    Threshold {
        input: String,
        output: String,
        min: f64,
    },
    /// Length of the list `input`.
    Count {
        input: String,
        output: String,
        #[serde(default = "default_count_kind")]
        list_kind: FieldKind,
    },
    /// Element-wise `numerator / denominator`, zero where the denominator
    /// is not positive.
    Ratio {
        numerator: String,
        denominator: String,
        output: String,
    },
}

fn default_count_kind() -> FieldKind {
    FieldKind::FloatList
}

impl StageSpec {
    /// Instantiates the stage.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a count over a non-list kind.
    pub fn build(&self) -> Result<Box<dyn Stage>> {
        let stage: Box<dyn Stage> = match self {
            Self::Decode { fields } => Box::new(DecodeStage {
                fields: fields.clone(),
            }),
            Self::Threshold { input, output, min } => Box::new(ThresholdStage {
                name: format!("threshold:{output}"),
                input: input.clone(),
                output: output.clone(),
                min: *min,
            }),
            Self::Count {
                input,
                output,
                list_kind,
            } => {
                if !list_kind.is_list() {
                    return Err(AnalysisError::config(format!(
                        "count stage '{output}' needs a list kind, got {list_kind}"
                    )));
                }
                Box::new(CountStage {
                    name: format!("count:{output}"),
                    input: FieldSpec::new(input.clone(), *list_kind),
                    output: output.clone(),
                })
            }
            Self::Ratio {
                numerator,
                denominator,
                output,
            } => Box::new(RatioStage {
                name: format!("ratio:{output}"),
                numerator: numerator.clone(),
                denominator: denominator.clone(),
                output: output.clone(),
            }),
        };
        Ok(stage)
    }
}

struct DecodeStage {
    fields: Vec<FieldSpec>,
}

impl DecodeStage {
    fn convert(&self, field: &FieldSpec, value: Option<&Value>) -> Result<FieldValue> {
        let mismatch = || {
            AnalysisError::stage(
                self.name(),
                format!("field '{}' is not of kind {}", field.name, field.kind),
            )
        };

        let value = match value {
            None | Some(Value::Null) => {
                return match field.kind {
                    FieldKind::IntList => Ok(FieldValue::IntList(Vec::new())),
                    FieldKind::FloatList => Ok(FieldValue::FloatList(Vec::new())),
                    _ => Err(AnalysisError::stage(
                        self.name(),
                        format!("record has no field '{}'", field.name),
                    )),
                };
            }
            Some(value) => value,
        };

        match field.kind {
            FieldKind::Int => value.as_i64().map(FieldValue::Int).ok_or_else(mismatch),
            FieldKind::Float => value.as_f64().map(FieldValue::Float).ok_or_else(mismatch),
            FieldKind::Text => value
                .as_str()
                .map(|s| FieldValue::Text(s.to_string()))
                .ok_or_else(mismatch),
            FieldKind::IntList => value
                .as_array()
                .and_then(|items| items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>())
                .map(FieldValue::IntList)
                .ok_or_else(mismatch),
            FieldKind::FloatList => value
                .as_array()
                .and_then(|items| items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>())
                .map(FieldValue::FloatList)
                .ok_or_else(mismatch),
        }
    }
}

impl Stage for DecodeStage {
    fn name(&self) -> &str {
        "decode"
    }

    fn requires(&self) -> Vec<FieldSpec> {
        Vec::new()
    }

    fn provides(&self) -> Vec<FieldSpec> {
        self.fields.clone()
    }

    fn process(&mut self, record: &EventRecord<'_>, ctx: &mut EventContext) -> Result<()> {
        let value: Value = serde_json::from_slice(&record.data).map_err(|e| {
            AnalysisError::stage(
                self.name(),
                format!(
                    "entry {} of {} is not valid JSON: {e}",
                    record.entry,
                    record.file.display()
                ),
            )
        })?;

        let object = value.as_object().ok_or_else(|| {
            AnalysisError::stage(
                self.name(),
                format!("entry {} is not a JSON object", record.entry),
            )
        })?;

        for field in &self.fields {
            let converted = self.convert(field, object.get(&field.name))?;
            ctx.insert(field.name.clone(), converted);
        }
        Ok(())
    }
}

struct ThresholdStage {
    name: String,
    input: String,
    output: String,
    min: f64,
}

impl Stage for ThresholdStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new(&self.input, FieldKind::FloatList)]
    }

    fn provides(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new(&self.output, FieldKind::FloatList)]
    }

    fn process(&mut self, _record: &EventRecord<'_>, ctx: &mut EventContext) -> Result<()> {
        let values = ctx
            .float_list(&self.name, &self.input)?
            .iter()
            .map(|&e| if e >= self.min { e } else { 0.0 })
            .collect();
        ctx.insert(self.output.clone(), FieldValue::FloatList(values));
        Ok(())
    }
}

struct CountStage {
    name: String,
    input: FieldSpec,
    output: String,
}

impl Stage for CountStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> Vec<FieldSpec> {
        vec![self.input.clone()]
    }

    fn provides(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new(&self.output, FieldKind::Int)]
    }

    fn process(&mut self, _record: &EventRecord<'_>, ctx: &mut EventContext) -> Result<()> {
        let len = ctx
            .require(&self.name, &self.input.name)?
            .list_len()
            .ok_or_else(|| {
                AnalysisError::stage(&self.name, format!("field '{}' is not a list", self.input.name))
            })?;
        ctx.insert(self.output.clone(), FieldValue::Int(len as i64));
        Ok(())
    }
}

struct RatioStage {
    name: String,
    numerator: String,
    denominator: String,
    output: String,
}

impl Stage for RatioStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::new(&self.numerator, FieldKind::FloatList),
            FieldSpec::new(&self.denominator, FieldKind::FloatList),
        ]
    }

    fn provides(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new(&self.output, FieldKind::FloatList)]
    }

    fn process(&mut self, _record: &EventRecord<'_>, ctx: &mut EventContext) -> Result<()> {
        let numerator = ctx.float_list(&self.name, &self.numerator)?;
        let denominator = ctx.float_list(&self.name, &self.denominator)?;
        if numerator.len() != denominator.len() {
            return Err(AnalysisError::stage(
                &self.name,
                format!(
                    "'{}' has {} elements but '{}' has {}",
                    self.numerator,
                    numerator.len(),
                    self.denominator,
                    denominator.len()
                ),
            ));
        }

        let ratio = numerator
            .iter()
            .zip(denominator)
            .map(|(&n, &d)| if d > 0.0 { n / d } else { 0.0 })
            .collect();
        ctx.insert(self.output.clone(), FieldValue::FloatList(ratio));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn record(data: &str) -> EventRecord<'static> {
        EventRecord {
            index: 0,
            entry: 0,
            file: Path::new("test.jsonl"),
            data: data.as_bytes().to_vec(),
        }
    }

    fn decode(fields: &[(&str, FieldKind)]) -> Box<dyn Stage> {
        StageSpec::Decode {
            fields: fields
                .iter()
                .map(|(name, kind)| FieldSpec::new(*name, *kind))
                .collect(),
        }
        .build()
        .unwrap()
    }

    #[test]
    fn test_decode_fields() {
        let mut stage = decode(&[
            ("run", FieldKind::Int),
            ("pfMet", FieldKind::Float),
            ("tag", FieldKind::Text),
            ("pdgId", FieldKind::IntList),
            ("energy", FieldKind::FloatList),
            ("absent", FieldKind::FloatList),
        ]);
        let mut ctx = EventContext::new("ds");

        stage
            .process(
                &record(r#"{"run": 1, "pfMet": 22.5, "tag": "a", "pdgId": [11, -11], "energy": [1, 2.5]}"#),
                &mut ctx,
            )
            .unwrap();

        assert_eq!(ctx.get("run"), Some(&FieldValue::Int(1)));
        assert_eq!(ctx.get("pfMet"), Some(&FieldValue::Float(22.5)));
        assert_eq!(ctx.get("tag"), Some(&FieldValue::Text("a".into())));
        assert_eq!(ctx.get("pdgId"), Some(&FieldValue::IntList(vec![11, -11])));
        assert_eq!(ctx.get("energy"), Some(&FieldValue::FloatList(vec![1.0, 2.5])));
        assert_eq!(ctx.get("absent"), Some(&FieldValue::FloatList(vec![])));
    }

    #[test]
    fn test_decode_missing_scalar_fails() {
        let mut stage = decode(&[("run", FieldKind::Int)]);
        let err = stage
            .process(&record(r#"{"lumi": 3}"#), &mut EventContext::new("ds"))
            .unwrap_err();
        assert!(err.to_string().contains("no field 'run'"));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let mut stage = decode(&[("run", FieldKind::Int)]);
        let mut ctx = EventContext::new("ds");

        assert!(stage.process(&record("not json"), &mut ctx).is_err());
        assert!(stage.process(&record("[1, 2]"), &mut ctx).is_err());
        assert!(stage.process(&record(r#"{"run": "x"}"#), &mut ctx).is_err());
    }

    #[test]
    fn test_threshold() {
        let mut stage = StageSpec::Threshold {
            input: "energy".into(),
            output: "energy_th".into(),
            min: 5.0,
        }
        .build()
        .unwrap();
        let mut ctx = EventContext::new("ds");
        ctx.insert("energy", FieldValue::FloatList(vec![1.0, 5.0, 7.5]));

        stage.process(&record(""), &mut ctx).unwrap();
        assert_eq!(
            ctx.get("energy_th"),
            Some(&FieldValue::FloatList(vec![0.0, 5.0, 7.5]))
        );
    }

    #[test]
    fn test_count() {
        let mut stage = StageSpec::Count {
            input: "pdgId".into(),
            output: "nGen".into(),
            list_kind: FieldKind::IntList,
        }
        .build()
        .unwrap();
        let mut ctx = EventContext::new("ds");
        ctx.insert("pdgId", FieldValue::IntList(vec![11, 13, 22]));

        stage.process(&record(""), &mut ctx).unwrap();
        assert_eq!(ctx.get("nGen"), Some(&FieldValue::Int(3)));
        assert_eq!(stage.requires(), vec![FieldSpec::new("pdgId", FieldKind::IntList)]);
    }

    #[test]
    fn test_count_needs_list_kind() {
        let spec = StageSpec::Count {
            input: "run".into(),
            output: "n".into(),
            list_kind: FieldKind::Int,
        };
        assert!(spec.build().is_err());
    }

    #[test]
    fn test_ratio_zero_denominator() {
        let mut stage = StageSpec::Ratio {
            numerator: "q0".into(),
            denominator: "q1".into(),
            output: "ratio".into(),
        }
        .build()
        .unwrap();
        let mut ctx = EventContext::new("ds");
        ctx.insert("q0", FieldValue::FloatList(vec![2.0, 1.0, 3.0]));
        ctx.insert("q1", FieldValue::FloatList(vec![4.0, 0.0, -1.0]));

        stage.process(&record(""), &mut ctx).unwrap();
        assert_eq!(
            ctx.get("ratio"),
            Some(&FieldValue::FloatList(vec![0.5, 0.0, 0.0]))
        );

        ctx.insert("q1", FieldValue::FloatList(vec![1.0]));
        assert!(stage.process(&record(""), &mut ctx).is_err());
    }

    #[test]
    fn test_spec_from_toml() {
        let spec: StageSpec = toml::from_str(
            r#"
            type = "threshold"
            input = "hfrechit_energy"
            output = "hfrechit_energy_th"
            min = 5.0
            "#,
        )
        .unwrap();

        assert_eq!(
            spec,
            StageSpec::Threshold {
                input: "hfrechit_energy".into(),
                output: "hfrechit_energy_th".into(),
                min: 5.0,
            }
        );

        let count: StageSpec =
            toml::from_str("type = \"count\"\ninput = \"e\"\noutput = \"n\"").unwrap();
        assert!(matches!(
            count,
            StageSpec::Count {
                list_kind: FieldKind::FloatList,
                ..
            }
        ));
    }
}
