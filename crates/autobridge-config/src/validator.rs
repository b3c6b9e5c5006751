//! Configuration validation.

use crate::schema::BridgeConfig;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &BridgeConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_worker(config, &mut result);
        Self::validate_registry(config, &mut result);
        Self::validate_sandbox(config, &mut result);

        result
    }

    fn validate_server(config: &BridgeConfig, result: &mut ValidationResult) {
        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }

        if config.server.bind_attempts == 0 {
            result.add_error(ValidationError::new(
                "server.bind_attempts",
                "bind_attempts must be greater than 0",
            ));
        }
    }

    fn validate_worker(config: &BridgeConfig, result: &mut ValidationResult) {
        let worker = &config.worker;

        if worker.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "worker.poll_interval_ms",
                "poll_interval_ms must be greater than 0",
            ));
        }

        if worker.start_timeout_ms == 0 || worker.finish_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "worker",
                "phase timeouts must be greater than 0",
            ));
        }

        if worker.poll_interval_ms > worker.start_timeout_ms {
            result.add_warning(ValidationWarning::new(
                "worker.poll_interval_ms",
                "poll interval exceeds the start timeout; the condition is checked only once",
            ));
        }
    }

    fn validate_registry(config: &BridgeConfig, result: &mut ValidationResult) {
        let registry = &config.registry;

        if registry.heartbeat_interval_secs == 0 {
            result.add_error(ValidationError::new(
                "registry.heartbeat_interval_secs",
                "heartbeat_interval_secs must be greater than 0",
            ));
        }

        if registry.stale_after_secs <= registry.heartbeat_interval_secs {
            result.add_warning(ValidationWarning::new(
                "registry.stale_after_secs",
                "stale window is not longer than the heartbeat; live instances may be dropped",
            ));
        }
    }

    fn validate_sandbox(config: &BridgeConfig, result: &mut ValidationResult) {
        if config.sandbox.allowed_commands.is_empty() {
            result.add_warning(ValidationWarning::new(
                "sandbox.allowed_commands",
                "No commands are allowed; runCliCommand will reject everything",
            ));
        }

        for command in &config.sandbox.allowed_commands {
            if command.trim().is_empty() || command.contains(char::is_whitespace) {
                result.add_error(ValidationError::new(
                    "sandbox.allowed_commands",
                    format!("Invalid command name: {:?}", command),
                ));
            }
        }
    }
}
