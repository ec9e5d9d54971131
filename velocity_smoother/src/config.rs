//! Configuration loading and live reconfiguration.
//!
//! Startup: one TOML file with `[shared]` and `[smoother]` tables, parsed by
//! [`load_config`] into a validated [`LoadedConfig`].
//!
//! Runtime: a batch of named [`Parameter`]s is converted into a partial
//! [`ParameterUpdate`], overlaid on the active parameters to build a shadow
//! snapshot, validated with the same rules as startup, and swapped in as a
//! whole by [`reconfigure`]. A rejected batch leaves the active snapshot
//! untouched.

use std::path::Path;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use smoother_common::config::{ConfigError, ConfigLoader, SharedConfig};
use smoother_common::smoother::config::{FeedbackMode, LiveConfig, SmootherConfig};
use smoother_common::twist::AXIS_COUNT;
use tracing::{info, trace, warn};

// ─── File Config ────────────────────────────────────────────────────

/// On-disk layout of `velocity_smoother.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmootherFileConfig {
    pub shared: SharedConfig,
    pub smoother: SmootherConfig,
}

/// Validated startup configuration.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub shared: SharedConfig,
    pub live: LiveConfig,
}

/// Load and validate the configuration file at `path`.
///
/// # Errors
/// `FileNotFound`, `ParseError` or `ValidationError`. Any of them is fatal
/// at startup.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let file = SmootherFileConfig::load(path)?;
    validate_file_config(file)
}

/// Load configuration from a TOML string (for testing).
pub fn load_config_from_str(content: &str) -> Result<LoadedConfig, ConfigError> {
    let file = SmootherFileConfig::from_toml(content)?;
    validate_file_config(file)
}

fn validate_file_config(file: SmootherFileConfig) -> Result<LoadedConfig, ConfigError> {
    file.shared.validate()?;
    let live = LiveConfig::new(file.smoother)?;
    Ok(LoadedConfig {
        shared: file.shared,
        live,
    })
}

// ─── Named Parameters ───────────────────────────────────────────────

/// Dynamically typed parameter value.
///
/// Untagged so JSON `0.5`, `[1, 0, 2]`, `true` and `"OPEN_LOOP"` map
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Double(f64),
    DoubleArray(Vec<f64>),
    String(String),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<[f64; AXIS_COUNT]> for ParamValue {
    fn from(v: [f64; AXIS_COUNT]) -> Self {
        Self::DoubleArray(v.to_vec())
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// One named parameter in a reconfiguration batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: ParamValue,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

fn as_double(p: &Parameter) -> Result<f64, ConfigError> {
    match p.value {
        ParamValue::Double(v) => Ok(v),
        _ => Err(type_mismatch(p, "a double")),
    }
}

fn as_bool(p: &Parameter) -> Result<bool, ConfigError> {
    match p.value {
        ParamValue::Bool(v) => Ok(v),
        _ => Err(type_mismatch(p, "a bool")),
    }
}

fn as_axes(p: &Parameter) -> Result<[f64; AXIS_COUNT], ConfigError> {
    match &p.value {
        ParamValue::DoubleArray(v) => {
            <[f64; AXIS_COUNT]>::try_from(v.as_slice()).map_err(|_| ConfigError::InvalidLength {
                name: p.name.clone(),
                len: v.len(),
            })
        }
        _ => Err(type_mismatch(p, "a double array")),
    }
}

fn as_feedback(p: &Parameter) -> Result<FeedbackMode, ConfigError> {
    match &p.value {
        ParamValue::String(s) => FeedbackMode::parse(s).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "feedback = '{s}' is not one of OPEN_LOOP, CLOSED_LOOP"
            ))
        }),
        _ => Err(type_mismatch(p, "a string")),
    }
}

fn type_mismatch(p: &Parameter, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        name: p.name.clone(),
        expected,
    }
}

// ─── Partial Update ─────────────────────────────────────────────────

/// Partial parameter set. `None` keeps the active value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterUpdate {
    pub smoothing_frequency: Option<f64>,
    pub feedback: Option<FeedbackMode>,
    pub scale_velocities: Option<bool>,
    pub max_velocity: Option<[f64; AXIS_COUNT]>,
    pub min_velocity: Option<[f64; AXIS_COUNT]>,
    pub max_accel: Option<[f64; AXIS_COUNT]>,
    pub max_decel: Option<[f64; AXIS_COUNT]>,
    pub deadband_velocity: Option<[f64; AXIS_COUNT]>,
    pub odom_duration: Option<f64>,
    pub velocity_timeout: Option<f64>,
    pub use_realtime_priority: Option<bool>,
}

impl ParameterUpdate {
    /// Convert a named batch.
    ///
    /// Names containing `.` belong to other components and are skipped.
    ///
    /// # Errors
    /// The first unknown name, type mismatch or wrong-length array rejects
    /// the whole batch.
    pub fn from_params(params: &[Parameter]) -> Result<Self, ConfigError> {
        let mut update = Self::default();
        for p in params {
            if p.name.contains('.') {
                trace!(name = %p.name, "skipping parameter owned by another component");
                continue;
            }
            match p.name.as_str() {
                "smoothing_frequency" => update.smoothing_frequency = Some(as_double(p)?),
                "feedback" => update.feedback = Some(as_feedback(p)?),
                "scale_velocities" => update.scale_velocities = Some(as_bool(p)?),
                "max_velocity" => update.max_velocity = Some(as_axes(p)?),
                "min_velocity" => update.min_velocity = Some(as_axes(p)?),
                "max_accel" => update.max_accel = Some(as_axes(p)?),
                "max_decel" => update.max_decel = Some(as_axes(p)?),
                "deadband_velocity" => update.deadband_velocity = Some(as_axes(p)?),
                "odom_duration" => update.odom_duration = Some(as_double(p)?),
                "velocity_timeout" => update.velocity_timeout = Some(as_double(p)?),
                "use_realtime_priority" => update.use_realtime_priority = Some(as_bool(p)?),
                other => return Err(ConfigError::UnknownParameter(other.to_string())),
            }
        }
        Ok(update)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay onto `base`, producing an unvalidated shadow.
    pub fn apply_to(&self, base: &SmootherConfig) -> SmootherConfig {
        SmootherConfig {
            smoothing_frequency: self.smoothing_frequency.unwrap_or(base.smoothing_frequency),
            feedback: self.feedback.unwrap_or(base.feedback),
            scale_velocities: self.scale_velocities.unwrap_or(base.scale_velocities),
            max_velocity: self.max_velocity.unwrap_or(base.max_velocity),
            min_velocity: self.min_velocity.unwrap_or(base.min_velocity),
            max_accel: self.max_accel.unwrap_or(base.max_accel),
            max_decel: self.max_decel.unwrap_or(base.max_decel),
            deadband_velocity: self.deadband_velocity.unwrap_or(base.deadband_velocity),
            odom_duration: self.odom_duration.unwrap_or(base.odom_duration),
            velocity_timeout: self.velocity_timeout.unwrap_or(base.velocity_timeout),
            use_realtime_priority: self
                .use_realtime_priority
                .unwrap_or(base.use_realtime_priority),
        }
    }
}

// ─── Change Classification ──────────────────────────────────────────

bitflags! {
    /// Parameter groups that differ between two snapshots.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangedParams: u8 {
        /// Tick rate; the timer must restart.
        const FREQUENCY   = 0x01;
        /// Feedback mode; the estimator is rebuilt.
        const FEEDBACK    = 0x02;
        const SCALING     = 0x04;
        /// Velocity, accel or decel bounds.
        const LIMITS      = 0x08;
        const DEADBAND    = 0x10;
        const TIMEOUT     = 0x20;
        /// Closed-loop window width; the estimator is rebuilt.
        const ODOM_WINDOW = 0x40;
    }
}

impl ChangedParams {
    /// Classify the differences from `old` to `new`.
    pub fn between(old: &SmootherConfig, new: &SmootherConfig) -> Self {
        let mut changed = Self::empty();
        changed.set(
            Self::FREQUENCY,
            old.smoothing_frequency != new.smoothing_frequency,
        );
        changed.set(Self::FEEDBACK, old.feedback != new.feedback);
        changed.set(Self::SCALING, old.scale_velocities != new.scale_velocities);
        changed.set(
            Self::LIMITS,
            old.max_velocity != new.max_velocity
                || old.min_velocity != new.min_velocity
                || old.max_accel != new.max_accel
                || old.max_decel != new.max_decel,
        );
        changed.set(Self::DEADBAND, old.deadband_velocity != new.deadband_velocity);
        changed.set(Self::TIMEOUT, old.velocity_timeout != new.velocity_timeout);
        changed.set(Self::ODOM_WINDOW, old.odom_duration != new.odom_duration);
        changed
    }

    /// Lower-case group names for logging.
    pub fn names(self) -> Vec<&'static str> {
        self.iter_names()
            .map(|(name, _)| match name {
                "FREQUENCY" => "frequency",
                "FEEDBACK" => "feedback",
                "SCALING" => "scaling",
                "LIMITS" => "limits",
                "DEADBAND" => "deadband",
                "TIMEOUT" => "timeout",
                _ => "odom_window",
            })
            .collect()
    }
}

// ─── Atomic Swap ────────────────────────────────────────────────────

/// Result of a reconfiguration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// New snapshot installed; carries the groups that changed.
    Accepted(ChangedParams),
    /// Batch rejected; active configuration unchanged.
    Rejected(String),
}

impl ReloadOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Human-readable rejection reason.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(reason) => Some(reason),
        }
    }
}

/// Reject changes to startup-only parameters.
pub fn validate_reload_scope(
    active: &SmootherConfig,
    shadow: &SmootherConfig,
) -> Result<(), ConfigError> {
    if active.use_realtime_priority != shadow.use_realtime_priority {
        return Err(ConfigError::ReloadScopeViolation(
            "use_realtime_priority".to_string(),
        ));
    }
    Ok(())
}

/// Build and validate the shadow snapshot for `update`.
pub fn parse_shadow_config(
    active: &LiveConfig,
    update: &ParameterUpdate,
) -> Result<LiveConfig, ConfigError> {
    let shadow = update.apply_to(active.params());
    validate_reload_scope(active.params(), &shadow)?;
    LiveConfig::new(shadow)
}

/// Validate `update` against `active` and swap it in.
///
/// On failure `active` is unchanged (rollback is a no-op since the swap
/// never happened).
pub fn reconfigure(active: &mut Arc<LiveConfig>, update: &ParameterUpdate) -> ReloadOutcome {
    let shadow = match parse_shadow_config(active, update) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "reconfiguration rejected; keeping active parameters");
            return ReloadOutcome::Rejected(e.to_string());
        }
    };

    let changed = ChangedParams::between(active.params(), shadow.params());
    if !changed.is_empty() {
        info!(changed = ?changed.names(), "reconfiguration accepted");
        *active = Arc::new(shadow);
    }
    ReloadOutcome::Accepted(changed)
}

/// [`reconfigure`] for a batch of named parameters.
pub fn reconfigure_params(active: &mut Arc<LiveConfig>, params: &[Parameter]) -> ReloadOutcome {
    match ParameterUpdate::from_params(params) {
        Ok(update) => reconfigure(active, &update),
        Err(e) => {
            warn!(error = %e, "reconfiguration rejected; keeping active parameters");
            ReloadOutcome::Rejected(e.to_string())
        }
    }
}
