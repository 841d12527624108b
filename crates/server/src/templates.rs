//! Template rendering for the web UI.
//!
//! Templates are embedded at compile time so the binary is self-contained.

use std::sync::LazyLock;

use include_dir::{Dir, include_dir};
use minijinja::value::Value;
use minijinja::{AutoEscape, Environment, Error};

static TEMPLATE_DIR: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Format a number as dollars with two decimals (`1234.5` -> `$1,234.50`).
#[allow(clippy::needless_pass_by_value)]
fn currency(value: Value) -> Value {
    let Some(amount) = as_f64(&value) else {
        return value;
    };
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    Value::from(format!("{sign}${grouped}.{:02}", cents % 100))
}

/// Format a fraction as a percentage (`0.1234` -> `12.34%`).
#[allow(clippy::needless_pass_by_value)]
fn percent(value: Value) -> Value {
    match as_f64(&value) {
        Some(fraction) => Value::from(format!("{:.2}%", fraction * 100.0)),
        None => value,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    if value.is_undefined() || value.is_none() {
        return None;
    }
    f64::try_from(value.clone()).ok()
}

static ENV: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();

    env.set_auto_escape_callback(|name| {
        if name.ends_with(".html") { AutoEscape::Html } else { AutoEscape::None }
    });

    env.add_filter("currency", currency);
    env.add_filter("percent", percent);

    for file in TEMPLATE_DIR.files() {
        let Some(name) = file.path().to_str() else {
            continue;
        };
        let Ok(contents) = std::str::from_utf8(file.contents()) else {
            tracing::warn!(template = name, "skipping template with invalid utf-8");
            continue;
        };
        if let Err(e) = env.add_template(name, contents) {
            tracing::error!(template = name, error = %e, "failed to load template");
        }
    }

    env
});

pub fn render<T: serde::Serialize>(name: &str, ctx: T) -> Result<String, Error> {
    let tpl = ENV.get_template(name)?;
    tpl.render(ctx)
}
