//! `list`: show what can be configured.
//!

use eyre::Result;
use strum::VariantNames;
use tabled::builder::Builder;
use tabled::settings::Style;

use ambutrack_common::Role;
use ambutrack_tracker::TrackerConfig;

/// Position sources and what they do.
///
pub fn list_sources() -> Result<String> {
    let mut builder = Builder::default();
    builder.push_record(["Name", "Description"]);
    builder.push_record(["fixed", "Static position (or the fallback one)"]);
    builder.push_record(["gpsd", "gpsd daemon over TCP, JSON protocol"]);
    builder.push_record(["replay", "Scripted track, for demos"]);
    builder.push_record(["denied", "Positioning refused, always the fallback"]);

    let table = builder.build().with(Style::rounded()).to_string();
    Ok(format!("List all position sources:\n{table}"))
}

/// Feed transports.
///
pub fn list_transports() -> Result<String> {
    let mut builder = Builder::default();
    builder.push_record(["Name", "Description"]);
    builder.push_record(["poll", "REST endpoint called on a fixed interval"]);
    builder.push_record(["push", "STOMP over WebSocket, per-ambulance topic"]);

    let table = builder.build().with(Style::rounded()).to_string();
    Ok(format!("List all transports:\n{table}"))
}

/// Effective tracker configuration, environment included.
///
pub fn list_config(cfg: &TrackerConfig) -> Result<String> {
    let geo = &cfg.geolocation;

    let mut builder = Builder::default();
    builder.push_record(["Setting".to_string(), "Value".to_string()]);
    let rows = [
        ("api_url", cfg.api_url()),
        ("transport", cfg.transport.to_string()),
        ("poll_interval", cfg.poll_interval.to_string()),
        ("location_route", cfg.location_route.clone()),
        ("update_route", cfg.update_route.clone()),
        ("ws_route", cfg.ws_route.clone()),
        ("topic", cfg.topic.clone()),
        ("notifications_queue", cfg.notifications_queue.clone()),
        ("epsilon", cfg.epsilon.to_string()),
        ("geolocation.source", geo.source.to_string()),
        ("geolocation.timeout", geo.timeout.to_string()),
        ("geolocation.fallback", format!("{:?}", geo.fallback)),
        ("roles", Role::VARIANTS.join(", ")),
    ];
    for (k, v) in rows {
        builder.push_record([k.to_string(), v]);
    }

    let table = builder.build().with(Style::rounded()).to_string();
    Ok(format!("Configuration:\n{table}"))
}
