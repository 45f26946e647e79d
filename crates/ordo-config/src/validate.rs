//! Field parsers for environment-provided values.

#![allow(clippy::redundant_pub_crate)]

use std::net::IpAddr;
use std::time::Duration;

use ordo_telemetry::LogFormat;

use crate::error::{ConfigError, ConfigResult};

pub(crate) fn parse_bind_addr(field: &'static str, value: &str) -> ConfigResult<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::InvalidField {
            field,
            reason: "not_an_ip_address",
            value: Some(value.to_string()),
        })
}

pub(crate) fn parse_port(field: &'static str, value: &str) -> ConfigResult<u16> {
    let port = value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidField {
            field,
            reason: "not_a_port",
            value: Some(value.to_string()),
        })?;
    if port == 0 {
        return Err(ConfigError::InvalidField {
            field,
            reason: "zero",
            value: Some(value.to_string()),
        });
    }
    Ok(port)
}

pub(crate) fn parse_positive_secs(field: &'static str, value: &str) -> ConfigResult<Duration> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidField {
            field,
            reason: "not_an_integer",
            value: Some(value.to_string()),
        })?;
    if secs == 0 {
        return Err(ConfigError::InvalidField {
            field,
            reason: "zero",
            value: Some(value.to_string()),
        });
    }
    Ok(Duration::from_secs(secs))
}

pub(crate) fn parse_log_format(field: &'static str, value: &str) -> ConfigResult<LogFormat> {
    LogFormat::parse(value).ok_or_else(|| ConfigError::InvalidField {
        field,
        reason: "unknown_format",
        value: Some(value.to_string()),
    })
}

pub(crate) fn non_empty(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidField {
            field,
            reason: "empty",
            value: None,
        });
    }
    Ok(trimmed.to_string())
}
