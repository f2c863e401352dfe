//! Single-bar SVG chart of an upstream value.

use async_trait::async_trait;
use loom_agent::{Agent, AgentContext, AgentFailure};
use loom_config::Mapping;
use serde_json::{Value, json};
use tracing::debug;

const WIDTH: f64 = 320.0;
const HEIGHT: f64 = 240.0;
const MARGIN: f64 = 32.0;
const BAR_WIDTH: f64 = 96.0;

/// Renders the first numeric value found under `input_key` (default
/// `result`) in any object input, and stores it as `<node_id>.svg`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartRenderer;

impl ChartRenderer {
  pub fn new() -> Self {
    Self
  }
}

fn find_value<'a>(inputs: &'a Mapping, key: &str) -> Option<&'a Value> {
  inputs
    .values()
    .filter_map(Value::as_object)
    .find_map(|obj| obj.get(key))
}

fn as_number(value: &Value) -> Option<f64> {
  let number = match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  };
  number.filter(|v: &f64| v.is_finite())
}

pub(crate) fn render_svg(value: f64) -> String {
  let y_max = f64::max(1.0, value * 1.2);
  let plot_height = HEIGHT - 2.0 * MARGIN;
  let bar_height = (value.max(0.0) / y_max * plot_height).min(plot_height);
  let x = (WIDTH - BAR_WIDTH) / 2.0;
  let y = HEIGHT - MARGIN - bar_height;

  format!(
    concat!(
      r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
      r#"<rect width="100%" height="100%" fill="white"/>"#,
      r#"<text x="{cx}" y="{ty}" text-anchor="middle" font-family="sans-serif" font-size="14">value = {value}</text>"#,
      r#"<line x1="{m}" y1="{base}" x2="{right}" y2="{base}" stroke="black"/>"#,
      r#"<rect x="{x:.1}" y="{y:.1}" width="{bw}" height="{bh:.1}" fill="steelblue"/>"#,
      "</svg>"
    ),
    w = WIDTH,
    h = HEIGHT,
    cx = WIDTH / 2.0,
    ty = MARGIN / 2.0 + 5.0,
    value = value,
    m = MARGIN,
    base = HEIGHT - MARGIN,
    right = WIDTH - MARGIN,
    x = x,
    y = y,
    bw = BAR_WIDTH,
    bh = bar_height,
  )
}

fn error(message: &str) -> Mapping {
  let mut output = Mapping::new();
  output.insert("error".to_string(), json!(message));
  output
}

#[async_trait]
impl Agent for ChartRenderer {
  async fn run(&self, inputs: Mapping, ctx: &AgentContext) -> Result<Mapping, AgentFailure> {
    let key = inputs
      .get("input_key")
      .and_then(Value::as_str)
      .unwrap_or("result");

    let Some(raw) = find_value(&inputs, key) else {
      return Ok(error("input key not found"));
    };
    let Some(value) = as_number(raw) else {
      return Ok(error("input not numeric"));
    };

    let svg = render_svg(value);
    let bytes = svg.len();
    let name = format!("{}.svg", ctx.node_id);
    ctx.put_artifact(&name, svg).await?;
    debug!(artifact = %name, bytes, "chart rendered");

    let mut output = Mapping::new();
    output.insert("generated".to_string(), json!(true));
    output.insert("bytes".to_string(), json!(bytes));
    Ok(output)
  }
}
