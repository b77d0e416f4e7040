#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<crate::train::TrainError> for AppError {
    fn from(err: crate::train::TrainError) -> Self {
        use crate::train::TrainError;
        let exit_code = match &err {
            TrainError::InvalidConfig(_) => 2,
            TrainError::Empty | TrainError::LabelImbalance { .. } => 3,
            TrainError::ShapeMismatch { .. } | TrainError::Exhausted { .. } => 4,
        };
        let mut message = format!("Training failed: {err}");
        if let TrainError::Exhausted { failures } = &err {
            for f in failures {
                message.push_str(&format!("\n  {}: {}", f.name, f.reason));
            }
        }
        AppError::new(exit_code, message)
    }
}

impl From<crate::io::model_store::StoreError> for AppError {
    fn from(err: crate::io::model_store::StoreError) -> Self {
        use crate::io::model_store::StoreError;
        let exit_code = match &err {
            StoreError::Io { .. } => 4,
            StoreError::NotFound { .. }
            | StoreError::Decode { .. }
            | StoreError::VersionMismatch { .. } => 2,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl From<crate::train::FitError> for AppError {
    fn from(err: crate::train::FitError) -> Self {
        AppError::new(4, format!("Prediction failed: {err}"))
    }
}
