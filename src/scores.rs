//! Derived score formulas. Pure functions, no I/O.

/// Weighted wellbeing score from one day's raw metrics, clamped to [1, 100].
///
/// Mood weighs 0.4, energy 0.3, and inverted stress (11 - stress) 0.3, all on
/// a 1-10 scale, scaled to 1-100. Higher mood or energy can never lower the
/// score; higher stress can never raise it.
pub fn wellbeing(mood: u8, energy: u8, stress: u8) -> u8 {
    let mood = f64::from(mood);
    let energy = f64::from(energy);
    let inverted_stress = 11.0 - f64::from(stress);
    let raw = (mood * 0.4 + energy * 0.3 + inverted_stress * 0.3) * 10.0;
    (raw.round() as i64).clamp(1, 100) as u8
}

/// Engagement growth score in [0, 100], summing four independently capped
/// terms: sessions (×2, cap 30), streak days (×3, cap 25), messages (×0.5,
/// cap 20), and completed goals (×5, cap 25).
pub fn growth(sessions: u32, streak_days: u32, messages: u32, goals_completed: u32) -> u8 {
    let sessions_term = (f64::from(sessions) * 2.0).min(30.0);
    let streak_term = (f64::from(streak_days) * 3.0).min(25.0);
    let messages_term = (f64::from(messages) * 0.5).min(20.0);
    let goals_term = (f64::from(goals_completed) * 5.0).min(25.0);
    (sessions_term + streak_term + messages_term + goals_term).round() as u8
}
