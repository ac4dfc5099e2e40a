use crate::types::{Category, FingerState};

use FingerState::{Extended as E, Folded as F};

pub const NONE_GESTURE: &str = "None";

/// Canned gestures as finger templates, thumb first.
const TEMPLATES: &[(&str, [FingerState; 5])] = &[
    ("Closed_Fist", [F, F, F, F, F]),
    ("Open_Palm", [E, E, E, E, E]),
    ("Pointing_Up", [F, E, F, F, F]),
    ("Thumb_Up", [E, F, F, F, F]),
    ("Thumb_Down", [E, F, F, F, F]),
    ("Victory", [F, E, E, F, F]),
    ("ILoveYou", [E, E, F, F, E]),
];

/// Ranks every known gesture for one hand, best first.
///
/// `raw` are the 21 landmarks in model space. Scores are template agreement
/// scaled by `hand_confidence`; `None` takes whatever the best template leaves.
pub fn rank_gestures(raw: &[[f32; 3]], hand_confidence: f32) -> Vec<Category> {
    if raw.len() < 21 {
        return vec![Category::new(0, NONE_GESTURE, hand_confidence.clamp(0.0, 1.0))];
    }

    let normalized = normalize_landmarks(raw);
    let states = [
        classify_thumb(&normalized),
        classify_finger(&normalized, [5, 6, 7, 8]),
        classify_finger(&normalized, [9, 10, 11, 12]),
        classify_finger(&normalized, [13, 14, 15, 16]),
        classify_finger(&normalized, [17, 18, 19, 20]),
    ];
    // Image y grows downwards.
    let thumb_points_up = raw[4][1] < raw[2][1];

    rank_states(&states, thumb_points_up, hand_confidence)
}

fn rank_states(
    states: &[FingerState; 5],
    thumb_points_up: bool,
    hand_confidence: f32,
) -> Vec<Category> {
    let confidence = hand_confidence.clamp(0.0, 1.0);

    let mut ranked: Vec<Category> = TEMPLATES
        .iter()
        .enumerate()
        .map(|(idx, (name, template))| {
            let mut agreement = template_agreement(states, template);
            let wrong_way = match *name {
                "Thumb_Up" => !thumb_points_up,
                "Thumb_Down" => thumb_points_up,
                _ => false,
            };
            if wrong_way {
                agreement *= 0.5;
            }
            Category::new(idx as i32 + 1, name, agreement * confidence)
        })
        .collect();

    let best = ranked.iter().map(|c| c.score).fold(0.0f32, f32::max);
    ranked.push(Category::new(0, NONE_GESTURE, (confidence - best).max(0.0)));

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    ranked
}

fn template_agreement(states: &[FingerState; 5], template: &[FingerState; 5]) -> f32 {
    let total: f32 = states
        .iter()
        .zip(template.iter())
        .map(|(state, expected)| match (state, expected) {
            (a, b) if a == b => 1.0,
            (FingerState::HalfBent, _) => 0.5,
            _ => 0.0,
        })
        .sum();
    total / 5.0
}

fn normalize_landmarks(points: &[[f32; 3]]) -> Vec<[f32; 3]> {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;

    for [x, y, _z] in points {
        min_x = min_x.min(*x);
        min_y = min_y.min(*y);
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }

    let span = (max_x - min_x).max(max_y - min_y).max(1e-3);
    points
        .iter()
        .map(|[x, y, z]| [(*x - min_x) / span, (*y - min_y) / span, *z / span])
        .collect()
}

fn classify_finger(points: &[[f32; 3]], idx: [usize; 4]) -> FingerState {
    let wrist = points[0];
    let mcp = points[idx[0]];
    let pip = points[idx[1]];
    let dip = points[idx[2]];
    let tip = points[idx[3]];

    let extension = distance3(tip, wrist) - distance3(pip, wrist);
    let reach = distance3(tip, wrist) - distance3(mcp, wrist);
    let straightness = average_straightness(sub(pip, mcp), sub(dip, pip), sub(tip, dip));

    if extension > 0.15 && straightness > 0.40 && reach > 0.06 {
        FingerState::Extended
    } else if extension < 0.08 || straightness < 0.18 || reach < 0.05 {
        FingerState::Folded
    } else {
        FingerState::HalfBent
    }
}

fn classify_thumb(points: &[[f32; 3]]) -> FingerState {
    let wrist = points[0];
    let cmc = points[1];
    let mcp = points[2];
    let ip = points[3];
    let tip = points[4];

    let tip_to_wrist = distance3(tip, wrist);
    let spread = distance3(tip, points[5]).min(distance3(tip, points[17]));
    let straightness = average_straightness(sub(mcp, cmc), sub(ip, mcp), sub(tip, ip));
    let extension = tip_to_wrist - distance3(ip, wrist);
    let reach = tip_to_wrist - distance3(mcp, wrist);

    if spread < 0.25 && (straightness < 0.28 || reach < 0.15) {
        FingerState::Folded
    } else if tip_to_wrist > 0.30 && straightness > 0.28 && extension > 0.08 {
        FingerState::Extended
    } else {
        FingerState::HalfBent
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn distance3(a: [f32; 3], b: [f32; 3]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

fn average_straightness(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> f32 {
    let ab = dot(unit(a), unit(b));
    let bc = dot(unit(b), unit(c));
    ((ab + bc) / 2.0).clamp(-1.0, 1.0)
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn unit(v: [f32; 3]) -> [f32; 3] {
    let len = dot(v, v).sqrt();
    if len < 1e-5 {
        [0.0, 0.0, 0.0]
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}
