use serde::{Deserialize, Serialize};

use crate::stages::{ExtraItem, ExtraItemKind};

fn default_qty() -> u32 {
    1
}

/// Aid categories requested at registration.
///
/// Set once by the registration desk; later desks only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeOfAid {
    pub left_below_knee: bool,
    pub left_above_knee: bool,
    pub right_below_knee: bool,
    pub right_above_knee: bool,
    pub left_caliper: bool,
    pub right_caliper: bool,
    pub above_hand: bool,
    pub below_hand: bool,
    pub shoes: bool,
    pub gloves: bool,
    pub walker: bool,
    pub stick: bool,
    #[serde(default = "default_qty")]
    pub stick_qty: u32,
    pub crutches: bool,
    #[serde(default = "default_qty")]
    pub crutches_qty: u32,
    pub elbow_crutches: bool,
    #[serde(default = "default_qty")]
    pub elbow_crutches_qty: u32,
    pub others: bool,
    pub others_specify: Option<String>,
}

impl Default for TypeOfAid {
    fn default() -> Self {
        Self {
            left_below_knee: false,
            left_above_knee: false,
            right_below_knee: false,
            right_above_knee: false,
            left_caliper: false,
            right_caliper: false,
            above_hand: false,
            below_hand: false,
            shoes: false,
            gloves: false,
            walker: false,
            stick: false,
            stick_qty: 1,
            crutches: false,
            crutches_qty: 1,
            elbow_crutches: false,
            elbow_crutches_qty: 1,
            others: false,
            others_specify: None,
        }
    }
}

/// Flag names accepted by [`TypeOfAid::set_flag`], in display order.
pub const AID_FLAGS: [&str; 15] = [
    "left_below_knee",
    "left_above_knee",
    "right_below_knee",
    "right_above_knee",
    "left_caliper",
    "right_caliper",
    "above_hand",
    "below_hand",
    "shoes",
    "gloves",
    "walker",
    "stick",
    "crutches",
    "elbow_crutches",
    "others",
];

impl TypeOfAid {
    /// Turn on a flag by name, optionally with a quantity (`stick=2`).
    pub fn set_flag(&mut self, spec: &str) -> Result<(), String> {
        let (name, qty) = match spec.split_once(['=', ':']) {
            Some((name, qty)) => {
                let qty = qty
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|q| *q >= 1)
                    .ok_or_else(|| format!("invalid quantity '{qty}' for '{name}'"))?;
                (name, Some(qty))
            }
            None => (spec, None),
        };
        let name = name.trim().to_ascii_lowercase().replace('-', "_");

        let flag = match name.as_str() {
            "left_below_knee" => &mut self.left_below_knee,
            "left_above_knee" => &mut self.left_above_knee,
            "right_below_knee" => &mut self.right_below_knee,
            "right_above_knee" => &mut self.right_above_knee,
            "left_caliper" => &mut self.left_caliper,
            "right_caliper" => &mut self.right_caliper,
            "above_hand" => &mut self.above_hand,
            "below_hand" => &mut self.below_hand,
            "shoes" => &mut self.shoes,
            "gloves" => &mut self.gloves,
            "walker" => &mut self.walker,
            "stick" => &mut self.stick,
            "crutches" => &mut self.crutches,
            "elbow_crutches" => &mut self.elbow_crutches,
            "others" => &mut self.others,
            other => return Err(format!("unknown aid type '{other}'")),
        };
        *flag = true;

        if let Some(qty) = qty {
            match name.as_str() {
                "stick" => self.stick_qty = qty,
                "crutches" => self.crutches_qty = qty,
                "elbow_crutches" => self.elbow_crutches_qty = qty,
                other => return Err(format!("'{other}' does not take a quantity")),
            }
        }
        Ok(())
    }

    /// One label per requested aid, e.g. `Stick (Qty: 2)`.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        let plain = [
            (self.left_below_knee, "Left Below Knee"),
            (self.left_above_knee, "Left Above Knee"),
            (self.right_below_knee, "Right Below Knee"),
            (self.right_above_knee, "Right Above Knee"),
            (self.left_caliper, "Left Caliper"),
            (self.right_caliper, "Right Caliper"),
            (self.above_hand, "Above Hand"),
            (self.below_hand, "Below Hand"),
            (self.shoes, "Shoes"),
            (self.gloves, "Gloves"),
            (self.walker, "Walker"),
        ];
        labels.extend(plain.iter().filter(|(on, _)| *on).map(|(_, l)| l.to_string()));

        if self.stick {
            labels.push(format!("Stick (Qty: {})", self.stick_qty.max(1)));
        }
        if self.crutches {
            labels.push(format!("Crutches (Qty: {})", self.crutches_qty.max(1)));
        }
        if self.elbow_crutches {
            labels.push(format!("Elbow Crutches (Qty: {})", self.elbow_crutches_qty.max(1)));
        }
        if self.others {
            if let Some(spec) = self.others_specify.as_deref().filter(|s| !s.trim().is_empty()) {
                labels.push(format!("Other: {}", spec.trim()));
            }
        }
        labels
    }

    /// Category names without quantities, used for summary counts.
    pub fn categories(&self) -> Vec<&'static str> {
        let flags = [
            (self.left_below_knee, "Left Below Knee"),
            (self.left_above_knee, "Left Above Knee"),
            (self.right_below_knee, "Right Below Knee"),
            (self.right_above_knee, "Right Above Knee"),
            (self.left_caliper, "Left Caliper"),
            (self.right_caliper, "Right Caliper"),
            (self.above_hand, "Above Hand"),
            (self.below_hand, "Below Hand"),
            (self.shoes, "Shoes"),
            (self.gloves, "Gloves"),
            (self.walker, "Walker"),
            (self.stick, "Stick"),
            (self.crutches, "Crutches"),
            (self.elbow_crutches, "Elbow Crutches"),
            (self.others, "Other"),
        ];
        flags.iter().filter(|(on, _)| *on).map(|(_, name)| *name).collect()
    }

    pub fn display(&self) -> String {
        let labels = self.labels();
        if labels.is_empty() {
            "Not specified".to_string()
        } else {
            labels.join(", ")
        }
    }

    /// Extra items worth offering at the extra-items desk given the aid
    /// requested at registration.
    pub fn suggested_extra_items(&self) -> Vec<ExtraItem> {
        let mut items = Vec::new();
        if self.stick {
            items.push(ExtraItem::new(ExtraItemKind::Stick, self.stick_qty.max(1)));
        }
        if self.shoes {
            items.push(ExtraItem::new(ExtraItemKind::Shoes, 1));
        }
        if self.crutches {
            items.push(ExtraItem::new(ExtraItemKind::Crutches, self.crutches_qty.max(1)));
        }
        if self.walker {
            items.push(ExtraItem::new(ExtraItemKind::Walker, 1));
        }
        if self.elbow_crutches {
            items.push(ExtraItem::new(ExtraItemKind::ElbowStick, self.elbow_crutches_qty.max(1)));
        }
        items
    }
}
