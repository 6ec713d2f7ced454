use std::fmt;

/// Result code of a backend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Ok,
  /// No backend is configured for this build.
  NotImplemented,
  /// Backend specific failure code. Backends may build it from a raw code,
  /// so `Error(0)` and `Error(2)` can occur; [`Status::normalized`] folds
  /// them into `Ok` and `NotImplemented`.
  Error(i32),
}

impl Status {
  pub const OK: i32 = 0;
  pub const OTHER: i32 = 1;
  pub const NOT_IMPLEMENTED: i32 = 2;
  /// The handle is not known to the registry or the backend.
  pub const UNKNOWN_HANDLE: i32 = 3;
  /// The operation needs an established connection.
  pub const NOT_CONNECTED: i32 = 4;

  pub fn from_code(code: i32) -> Self {
    match code {
      Self::OK => Status::Ok,
      Self::NOT_IMPLEMENTED => Status::NotImplemented,
      other => Status::Error(other),
    }
  }

  pub fn code(self) -> i32 {
    match self {
      Status::Ok => Self::OK,
      Status::NotImplemented => Self::NOT_IMPLEMENTED,
      Status::Error(code) => code,
    }
  }

  /// The canonical variant for this status's code.
  pub fn normalized(self) -> Self {
    Status::from_code(self.code())
  }

  pub fn is_ok(self) -> bool {
    self.normalized() == Status::Ok
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.code())
  }
}
