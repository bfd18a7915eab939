use std::collections::BTreeMap;

/// What a UI control physically delivers: slider/spinner position or a
/// checkbox state. Combo boxes deliver their index as `Int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValue {
    Int(i64),
    Bool(bool),
}

/// A normalized parameter value as handed to an operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Choice(usize),
}

/// Semantic type of one control, driving raw-value normalization.
#[derive(Debug, Clone, Copy)]
pub enum ControlKind {
    /// Plain integer range, used directly.
    Int,
    /// Kernel-size style integer: even raw values coerce down to the nearest
    /// odd value, floored at the operator's minimum (1 or 3).
    OddInt { floor: i64 },
    /// Fractional value carried on an integer control: raw / denom.
    Scaled { denom: i64 },
    /// Checkbox.
    Bool,
    /// Combo index mapped through a fixed ordered label table.
    Choice { labels: &'static [&'static str] },
}

/// Explicit per-control descriptor: one record per slider/checkbox/combo of
/// an operator panel, held in the operator's static table.
#[derive(Debug, Clone, Copy)]
pub struct ControlSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: ControlKind,
    pub min: i64,
    pub max: i64,
    pub default: RawValue,
}

impl ControlSpec {
    pub const fn int(id: &'static str, label: &'static str, min: i64, max: i64, default: i64) -> Self {
        Self {
            id,
            label,
            kind: ControlKind::Int,
            min,
            max,
            default: RawValue::Int(default),
        }
    }

    pub const fn odd(
        id: &'static str,
        label: &'static str,
        min: i64,
        max: i64,
        default: i64,
        floor: i64,
    ) -> Self {
        Self {
            id,
            label,
            kind: ControlKind::OddInt { floor },
            min,
            max,
            default: RawValue::Int(default),
        }
    }

    pub const fn scaled(
        id: &'static str,
        label: &'static str,
        min: i64,
        max: i64,
        default: i64,
        denom: i64,
    ) -> Self {
        Self {
            id,
            label,
            kind: ControlKind::Scaled { denom },
            min,
            max,
            default: RawValue::Int(default),
        }
    }

    pub const fn flag(id: &'static str, label: &'static str, default: bool) -> Self {
        Self {
            id,
            label,
            kind: ControlKind::Bool,
            min: 0,
            max: 1,
            default: RawValue::Bool(default),
        }
    }

    pub const fn choice(
        id: &'static str,
        label: &'static str,
        labels: &'static [&'static str],
        default: i64,
    ) -> Self {
        Self {
            id,
            label,
            kind: ControlKind::Choice { labels },
            min: 0,
            max: labels.len() as i64 - 1,
            default: RawValue::Int(default),
        }
    }

    /// Normalizes a raw control value per this control's semantic type.
    pub fn normalize(&self, raw: RawValue) -> ParamValue {
        match (self.kind, raw) {
            (ControlKind::Int, RawValue::Int(v)) => ParamValue::Int(v.clamp(self.min, self.max)),
            (ControlKind::OddInt { floor }, RawValue::Int(v)) => {
                let v = v.clamp(self.min, self.max);
                let v = if v % 2 == 0 { v - 1 } else { v };
                ParamValue::Int(v.max(floor))
            }
            (ControlKind::Scaled { denom }, RawValue::Int(v)) => {
                let v = v.clamp(self.min, self.max);
                ParamValue::Float(v as f64 / denom as f64)
            }
            (ControlKind::Bool, RawValue::Bool(b)) => ParamValue::Bool(b),
            (ControlKind::Bool, RawValue::Int(v)) => ParamValue::Bool(v != 0),
            (ControlKind::Choice { labels }, RawValue::Int(v)) => {
                let idx = v.clamp(0, labels.len() as i64 - 1) as usize;
                ParamValue::Choice(idx)
            }
            // A checkbox value on a numeric control: treat as 0/1.
            (_, RawValue::Bool(b)) => self.normalize(RawValue::Int(b as i64)),
        }
    }

    /// Label text for the normalized value, as shown next to the control.
    pub fn format(&self, value: ParamValue) -> String {
        match (self.kind, value) {
            (ControlKind::Scaled { denom }, ParamValue::Float(f)) => {
                if denom >= 100 {
                    format!("{f:.2}")
                } else {
                    format!("{f:.1}")
                }
            }
            (ControlKind::Choice { labels }, ParamValue::Choice(i)) => {
                labels.get(i).copied().unwrap_or("?").to_string()
            }
            (_, ParamValue::Bool(b)) => (if b { "on" } else { "off" }).to_string(),
            (_, ParamValue::Int(v)) => v.to_string(),
            (_, ParamValue::Float(f)) => format!("{f:.1}"),
            (_, ParamValue::Choice(i)) => i.to_string(),
        }
    }

    /// Raw control position for a normalized value, for re-syncing controls
    /// after a reset.
    pub fn raw_of(&self, value: ParamValue) -> RawValue {
        match (self.kind, value) {
            (ControlKind::Scaled { denom }, ParamValue::Float(f)) => {
                RawValue::Int((f * denom as f64).round() as i64)
            }
            (_, ParamValue::Bool(b)) => RawValue::Bool(b),
            (_, ParamValue::Int(v)) => RawValue::Int(v),
            (_, ParamValue::Choice(i)) => RawValue::Int(i as i64),
            (_, ParamValue::Float(f)) => RawValue::Int(f.round() as i64),
        }
    }
}

/// The current parameter values of one open panel. Defaults and current
/// values share the same key set by construction; `reset` reinstates the
/// defaults wholesale.
#[derive(Debug, Clone)]
pub struct ParamSet {
    specs: &'static [ControlSpec],
    values: BTreeMap<&'static str, ParamValue>,
}

impl ParamSet {
    pub fn from_specs(specs: &'static [ControlSpec]) -> Self {
        let values = specs
            .iter()
            .map(|spec| (spec.id, spec.normalize(spec.default)))
            .collect();
        Self { specs, values }
    }

    fn spec(&self, id: &str) -> Option<&ControlSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    /// Normalizes and stores a raw control value. Returns the normalized
    /// value, or `None` for a control this panel does not declare.
    pub fn set_raw(&mut self, id: &str, raw: RawValue) -> Option<ParamValue> {
        let spec = self.spec(id)?;
        let value = spec.normalize(raw);
        self.values.insert(spec.id, value);
        Some(value)
    }

    pub fn reset(&mut self) {
        for spec in self.specs {
            self.values.insert(spec.id, spec.normalize(spec.default));
        }
    }

    pub fn value(&self, id: &str) -> Option<ParamValue> {
        self.values.get(id).copied()
    }

    /// Label text for one control's current value.
    pub fn format(&self, id: &str) -> Option<String> {
        let spec = self.spec(id)?;
        Some(spec.format(self.values[spec.id]))
    }

    /// Raw control positions, for pushing values back into the UI after a
    /// reset.
    pub fn raw_values(&self) -> Vec<(&'static str, RawValue)> {
        self.specs
            .iter()
            .map(|spec| (spec.id, spec.raw_of(self.values[spec.id])))
            .collect()
    }

    /// Typed accessors. Operators only read controls they declared, so a
    /// missing id or mismatched type is a programming error and panics.
    pub fn int(&self, id: &str) -> i64 {
        match self.values.get(id) {
            Some(ParamValue::Int(v)) => *v,
            other => panic!("no integer control '{id}' (found {other:?})"),
        }
    }

    pub fn float(&self, id: &str) -> f64 {
        match self.values.get(id) {
            Some(ParamValue::Float(v)) => *v,
            other => panic!("no scaled control '{id}' (found {other:?})"),
        }
    }

    pub fn flag(&self, id: &str) -> bool {
        match self.values.get(id) {
            Some(ParamValue::Bool(v)) => *v,
            other => panic!("no boolean control '{id}' (found {other:?})"),
        }
    }

    pub fn choice(&self, id: &str) -> usize {
        match self.values.get(id) {
            Some(ParamValue::Choice(v)) => *v,
            other => panic!("no choice control '{id}' (found {other:?})"),
        }
    }
}
