//! Benchmark for view generation and application using synthetic orders.
//!
//! Builds a list of orders, generates a view, renders it as JSON lines,
//! compresses and digests it, reads it back, and applies it both to a fresh
//! model and to a drifted copy of the original.
//!
//! Usage: `bench-orders [orders] [items-per-order]`

use std::error::Error;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value as Json, json};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use viewbind::model::{ListRef, ModelType, ObjectRef, Scalar, ScalarKind, Value};
use viewbind::{
    DateTimeConverter, EntityCounter, Event, EventKind, Template, TemplateBuilder, View,
    ViewContext,
};

const DEFAULT_ORDERS: usize = 2_000;
const DEFAULT_ITEMS: usize = 20;
const ZSTD_LEVEL: i32 = 3;

// =============================================================================
// MODEL
// =============================================================================

struct Schema {
    order: ModelType,
    item: ModelType,
}

impl Schema {
    fn new() -> Self {
        let item = ModelType::builder("Item")
            .scalar("sku", ScalarKind::String)
            .scalar("qty", ScalarKind::Int)
            .scalar("price", ScalarKind::Float)
            .build();
        let order = ModelType::builder("Order")
            .scalar("id", ScalarKind::String)
            .scalar("placed", ScalarKind::Date)
            .list("items")
            .map("tags", ScalarKind::String)
            .build();
        Self { order, item }
    }

    fn template(&self) -> Result<Template, Box<dyn Error>> {
        let template = TemplateBuilder::for_array_of_objects(&self.order)
            .identity(["id"])
            .value("id")
            .value("placed")
            .array_of_objects("items", &self.item)
                .identity(["sku"])
                .value("sku")
                .value("qty")
                .value("price")
            .end()
            .map_of_values("tags", ScalarKind::String)
            .build()?;
        Ok(template)
    }
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or_default()
}

fn build_orders(schema: &Schema, orders: usize, items: usize) -> ListRef {
    let list = ListRef::new();
    let placed = now_micros();
    for n in 0..orders {
        let order = ObjectRef::new(&schema.order)
            .with("id", Uuid::now_v7().to_string())
            .with("placed", Scalar::Date(placed - (n as i64) * 60_000_000));
        if let Value::List(lines) = order.get("items") {
            for i in 0..items {
                lines.push(
                    ObjectRef::new(&schema.item)
                        .with("sku", Uuid::new_v4().simple().to_string())
                        .with("qty", (i % 7 + 1) as i64)
                        .with("price", 0.25 * (i + 1) as f64),
                );
            }
        }
        if let Value::Map(tags) = order.get("tags") {
            tags.insert("channel", if n % 2 == 0 { "web" } else { "store" });
            tags.insert("region", format!("r{}", n % 5));
        }
        list.push(order);
    }
    list
}

/// Copies `orders` and drifts the copy: every third order loses its first
/// item and every fifth has its items reversed.
fn drifted_copy(schema: &Schema, orders: &ListRef) -> ListRef {
    let copy = ListRef::new();
    for (n, value) in orders.snapshot().iter().enumerate() {
        let Some(order) = value.as_object() else {
            continue;
        };
        let twin = ObjectRef::new(&schema.order)
            .with("id", order.get("id"))
            .with("placed", order.get("placed"));
        if let (Value::List(from), Value::List(to)) = (order.get("items"), twin.get("items")) {
            let mut lines = from.snapshot();
            if n % 3 == 0 && !lines.is_empty() {
                lines.remove(0);
            }
            if n % 5 == 0 {
                lines.reverse();
            }
            for line in lines {
                if let Some(line) = line.as_object() {
                    to.push(
                        ObjectRef::new(&schema.item)
                            .with("sku", line.get("sku"))
                            .with("qty", line.get("qty"))
                            .with("price", line.get("price")),
                    );
                }
            }
        }
        copy.push(twin);
    }
    copy
}

fn context() -> ViewContext {
    let mut ctx = ViewContext::new();
    ctx.add_converter(Arc::new(DateTimeConverter));
    ctx
}

// =============================================================================
// JSON LINES
// =============================================================================

fn kind_code(kind: EventKind) -> &'static str {
    match kind {
        EventKind::BeginObject => "bo",
        EventKind::EndObject => "eo",
        EventKind::BeginArray => "ba",
        EventKind::EndArray => "ea",
        EventKind::Value => "v",
        EventKind::Meta => "m",
        EventKind::Discriminator => "d",
    }
}

fn scalar_to_json(scalar: &Scalar) -> Json {
    match scalar {
        Scalar::Null => Json::Null,
        Scalar::Bool(b) => json!(b),
        Scalar::Int(i) => json!(i),
        Scalar::Float(f) => json!(f),
        Scalar::String(s) => json!(s),
        Scalar::Date(micros) => json!({ "date": micros }),
    }
}

fn scalar_from_json(json: &Json) -> Result<Scalar, Box<dyn Error>> {
    Ok(match json {
        Json::Null => Scalar::Null,
        Json::Bool(b) => Scalar::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Scalar::Int(i),
            None => Scalar::Float(n.as_f64().ok_or("number out of range")?),
        },
        Json::String(s) => Scalar::String(s.clone()),
        Json::Object(map) => match map.get("date").and_then(Json::as_i64) {
            Some(micros) => Scalar::Date(micros),
            None => return Err(format!("unexpected scalar object {json}").into()),
        },
        Json::Array(_) => return Err(format!("unexpected scalar array {json}").into()),
    })
}

/// Renders one event per line.
fn to_json_lines(view: &View) -> String {
    let mut out = String::new();
    for event in view {
        let mut line = Map::new();
        line.insert("k".to_string(), json!(kind_code(event.kind())));
        if let Some(name) = event.name() {
            line.insert("n".to_string(), json!(name));
        }
        if let Some(ns) = event.namespace() {
            line.insert("ns".to_string(), json!(ns));
        }
        if let Some(value) = event.scalar() {
            line.insert("v".to_string(), scalar_to_json(value));
        }
        out.push_str(&Json::Object(line).to_string());
        out.push('\n');
    }
    out
}

fn from_json_lines(text: &str) -> Result<View, Box<dyn Error>> {
    let mut events = Vec::new();
    for line in text.lines().filter(|l| !l.is_empty()) {
        let json: Json = serde_json::from_str(line)?;
        let name = json.get("n").and_then(Json::as_str);
        let value = json.get("v").map(scalar_from_json).transpose()?;
        let kind = json.get("k").and_then(Json::as_str).unwrap_or_default();
        let mut event = match (kind, name) {
            ("bo", _) => Event::begin_object(name),
            ("eo", _) => Event::end_object(),
            ("ba", _) => Event::begin_array(name),
            ("ea", _) => Event::end_array(),
            ("v", Some(name)) => Event::value(name, value.unwrap_or_default()),
            ("v", None) => Event::element(value.unwrap_or_default()),
            ("m", Some(name)) => Event::meta(name, value.unwrap_or_default()),
            ("d", Some(name)) => Event::discriminator(name, value.unwrap_or_default()),
            _ => return Err(format!("unrecognized event line: {line}").into()),
        };
        if let Some(ns) = json.get("ns").and_then(Json::as_str) {
            event = event.in_namespace(ns);
        }
        events.push(event);
    }
    Ok(View::new(events))
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args().skip(1);
    let orders: usize = match args.next() {
        Some(arg) => arg.parse()?,
        None => DEFAULT_ORDERS,
    };
    let items: usize = match args.next() {
        Some(arg) => arg.parse()?,
        None => DEFAULT_ITEMS,
    };

    let schema = Schema::new();
    let template = schema.template()?;
    info!(orders, items, version = viewbind::VERSION, "building model");

    let build_start = Instant::now();
    let model = build_orders(&schema, orders, items);
    println!(
        "Built {} orders x {} items in {:?}",
        orders,
        items,
        build_start.elapsed()
    );

    // Generate
    let generate_start = Instant::now();
    let view = template.generate(&Value::List(model.clone()), &mut context())?;
    let generate_time = generate_start.elapsed();
    println!("\nGenerated {} events in {:?}", view.len(), generate_time);
    println!(
        "  Throughput: {:.2} M events/s",
        (view.len() as f64 / 1_000_000.0) / generate_time.as_secs_f64()
    );

    // Render
    let render_start = Instant::now();
    let text = to_json_lines(&view);
    println!(
        "\nJSON lines: {} bytes in {:?}",
        text.len(),
        render_start.elapsed()
    );

    let digest = Sha256::digest(text.as_bytes());
    println!("  SHA-256: {:x}", digest);

    // Compress
    let compress_start = Instant::now();
    let compressed = zstd::encode_all(text.as_bytes(), ZSTD_LEVEL)?;
    println!(
        "\nCompressed (level {}): {} bytes in {:?}",
        ZSTD_LEVEL,
        compressed.len(),
        compress_start.elapsed()
    );
    println!(
        "  Compression ratio: {:.1}x",
        text.len() as f64 / compressed.len() as f64
    );

    // Read back
    let read_start = Instant::now();
    let decompressed = String::from_utf8(zstd::decode_all(compressed.as_slice())?)?;
    let parsed = from_json_lines(&decompressed)?;
    println!("\nRead back {} events in {:?}", parsed.len(), read_start.elapsed());
    if Sha256::digest(decompressed.as_bytes()) != digest || parsed != view {
        return Err("view did not survive the JSON lines round trip".into());
    }

    // Apply to a fresh model
    let fresh_start = Instant::now();
    let fresh = template.apply_new(&parsed, &mut context())?;
    let fresh_time = fresh_start.elapsed();
    println!("\nApplied to fresh model in {:?}", fresh_time);
    let again = template.generate(&fresh, &mut context())?;
    if again != view {
        return Err("fresh model does not regenerate the same view".into());
    }

    // Reconcile against a drifted copy
    let drifted = drifted_copy(&schema, &model);
    let counter = Rc::new(EntityCounter::new());
    let mut ctx = context();
    ctx.add_listener(counter.clone());
    let reconcile_start = Instant::now();
    template.apply(&parsed, &Value::List(drifted.clone()), &mut ctx)?;
    let reconcile_time = reconcile_start.elapsed();
    println!("\nReconciled drifted model in {:?}", reconcile_time);
    println!(
        "  - {} entities created, {} discarded",
        counter.created(),
        counter.discarded()
    );
    debug!(depth = ctx.depth(), "reconciliation finished");

    let reconciled = template.generate(&Value::List(drifted), &mut context())?;
    if reconciled != view {
        return Err("drifted model does not regenerate the same view".into());
    }
    println!("\nAll round trips verified.");
    Ok(())
}
