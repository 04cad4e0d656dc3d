//! Temperature formatting helpers for display

/// Formats a value with at most one decimal place, dropping a trailing `.0`.
fn format_decimal(value: f64) -> String {
    let rounded = format!("{:.1}", value);
    let trimmed = rounded.strip_suffix(".0").unwrap_or(&rounded);
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn format_celsius(celsius: f64) -> String {
    format!("{}°C", format_decimal(celsius))
}

pub fn format_fahrenheit(fahrenheit: f64) -> String {
    format!("{}°F", format_decimal(fahrenheit))
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// "12°C - 18.5°C"
pub fn format_range(min_celsius: f64, max_celsius: f64) -> String {
    format!("{} - {}", format_celsius(min_celsius), format_celsius(max_celsius))
}

/// Coarse one-word description of how a temperature feels.
pub fn describe(celsius: f64) -> &'static str {
    if celsius < 0.0 {
        "Freezing"
    } else if celsius < 10.0 {
        "Cold"
    } else if celsius < 20.0 {
        "Cool"
    } else if celsius < 30.0 {
        "Warm"
    } else {
        "Hot"
    }
}
