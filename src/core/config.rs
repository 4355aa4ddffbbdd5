use std::env;

use chrono::{NaiveTime, Weekday};

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub tickets: TicketConfig,
    pub sla: SlaConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone)]
pub struct TicketConfig {
    /// Prefix for generated ticket references, e.g. "ESC" -> "ESC-A1B2C3".
    pub reference_prefix: String,
    pub default_priority: String,
    pub auto_close_resolved_after_days: i64,
}

#[derive(Debug, Clone)]
pub struct SlaConfig {
    pub business_hours_start: NaiveTime,
    pub business_hours_end: NaiveTime,
    /// Active weekdays for business-hours arithmetic.
    pub business_days: Vec<Weekday>,
    pub warning_threshold_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            database: DatabaseConfig::from_env()?,
            tickets: TicketConfig::from_env()?,
            sla: SlaConfig::from_env()?,
        })
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl TicketConfig {
    const DEFAULT_REFERENCE_PREFIX: &'static str = "ESC";
    const DEFAULT_PRIORITY: &'static str = "medium";
    const DEFAULT_AUTO_CLOSE_DAYS: i64 = 7;

    pub fn from_env() -> Result<Self, String> {
        let reference_prefix = env::var("TICKET_REFERENCE_PREFIX")
            .unwrap_or_else(|_| Self::DEFAULT_REFERENCE_PREFIX.to_string());

        let default_priority = env::var("TICKET_DEFAULT_PRIORITY")
            .unwrap_or_else(|_| Self::DEFAULT_PRIORITY.to_string());

        let auto_close_resolved_after_days = env::var("TICKET_AUTO_CLOSE_RESOLVED_AFTER_DAYS")
            .unwrap_or_else(|_| Self::DEFAULT_AUTO_CLOSE_DAYS.to_string())
            .parse::<i64>()
            .map_err(|_| {
                "TICKET_AUTO_CLOSE_RESOLVED_AFTER_DAYS must be a valid number".to_string()
            })?;

        Ok(Self {
            reference_prefix,
            default_priority,
            auto_close_resolved_after_days,
        })
    }
}

impl SlaConfig {
    const DEFAULT_BUSINESS_HOURS_START: &'static str = "09:00";
    const DEFAULT_BUSINESS_HOURS_END: &'static str = "17:00";
    const DEFAULT_BUSINESS_DAYS: &'static str = "1,2,3,4,5"; // ISO Mon..Fri
    const DEFAULT_WARNING_THRESHOLD_MINUTES: i64 = 30;

    pub fn from_env() -> Result<Self, String> {
        let business_hours_start = parse_time(
            &env::var("SLA_BUSINESS_HOURS_START")
                .unwrap_or_else(|_| Self::DEFAULT_BUSINESS_HOURS_START.to_string()),
        )
        .ok_or_else(|| "SLA_BUSINESS_HOURS_START must be HH:MM".to_string())?;

        let business_hours_end = parse_time(
            &env::var("SLA_BUSINESS_HOURS_END")
                .unwrap_or_else(|_| Self::DEFAULT_BUSINESS_HOURS_END.to_string()),
        )
        .ok_or_else(|| "SLA_BUSINESS_HOURS_END must be HH:MM".to_string())?;

        let business_days = env::var("SLA_BUSINESS_DAYS")
            .unwrap_or_else(|_| Self::DEFAULT_BUSINESS_DAYS.to_string())
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u8>()
                    .ok()
                    .and_then(iso_weekday)
                    .ok_or_else(|| format!("Invalid ISO weekday in SLA_BUSINESS_DAYS: {}", s))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let warning_threshold_minutes = env::var("SLA_WARNING_THRESHOLD_MINUTES")
            .unwrap_or_else(|_| Self::DEFAULT_WARNING_THRESHOLD_MINUTES.to_string())
            .parse::<i64>()
            .map_err(|_| "SLA_WARNING_THRESHOLD_MINUTES must be a valid number".to_string())?;

        Ok(Self {
            business_hours_start,
            business_hours_end,
            business_days,
            warning_threshold_minutes,
        })
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Map an ISO weekday number (Mon=1 .. Sun=7) to a chrono weekday.
fn iso_weekday(n: u8) -> Option<Weekday> {
    match n {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}
