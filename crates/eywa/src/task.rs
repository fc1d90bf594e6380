//! Task lifecycle and reporting.
//!
//! Everything here except [`Eywa::get_task`] is a notification: the host
//! never answers, so these return as soon as the line is written.

use serde_json::{Value, json};
use tracing::debug;

use crate::{Eywa, LogEvent, LogRecord, Report, Result, TaskStatus};

impl Eywa {
    /// Send a log record to the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the write fails.
    pub async fn log(&self, record: LogRecord) -> Result<()> {
        let params = serde_json::to_value(&record)?;
        self.connection.notify("task.log", Some(params)).await?;
        Ok(())
    }

    async fn log_event(&self, event: LogEvent, message: &str, data: Option<Value>) -> Result<()> {
        let mut record = LogRecord::new(event, message);
        record.data = data;
        self.log(record).await
    }

    /// # Errors
    ///
    /// See [`Eywa::log`].
    pub async fn info(&self, message: &str, data: Option<Value>) -> Result<()> {
        self.log_event(LogEvent::Info, message, data).await
    }

    /// # Errors
    ///
    /// See [`Eywa::log`].
    pub async fn warn(&self, message: &str, data: Option<Value>) -> Result<()> {
        self.log_event(LogEvent::Warn, message, data).await
    }

    /// # Errors
    ///
    /// See [`Eywa::log`].
    pub async fn error(&self, message: &str, data: Option<Value>) -> Result<()> {
        self.log_event(LogEvent::Error, message, data).await
    }

    /// # Errors
    ///
    /// See [`Eywa::log`].
    pub async fn debug(&self, message: &str, data: Option<Value>) -> Result<()> {
        self.log_event(LogEvent::Debug, message, data).await
    }

    /// # Errors
    ///
    /// See [`Eywa::log`].
    pub async fn trace(&self, message: &str, data: Option<Value>) -> Result<()> {
        self.log_event(LogEvent::Trace, message, data).await
    }

    /// # Errors
    ///
    /// See [`Eywa::log`].
    pub async fn exception(&self, message: &str, data: Option<Value>) -> Result<()> {
        self.log_event(LogEvent::Exception, message, data).await
    }

    /// Attach a report (message, optional table data, optional image) to the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the write fails.
    pub async fn report(&self, report: Report) -> Result<()> {
        let params = serde_json::to_value(&report)?;
        self.connection.notify("task.report", Some(params)).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the connection is closed or the write fails.
    pub async fn update_task(&self, status: TaskStatus) -> Result<()> {
        self.connection
            .notify("task.update", Some(json!({ "status": status })))
            .await?;
        Ok(())
    }

    /// Report the final status and close the connection.
    ///
    /// Exiting the process is left to the caller; see [`TaskStatus::exit_code`].
    ///
    /// # Errors
    ///
    /// Returns an error if the status could not be written. The connection
    /// is closed either way.
    pub async fn close_task(&self, status: TaskStatus) -> Result<()> {
        let sent = self
            .connection
            .notify("task.close", Some(json!({ "status": status })))
            .await;
        debug!(%status, "Closing task");
        self.connection.close().await;
        sent?;
        Ok(())
    }

    /// Hand the task back to the host without a final status, then close.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be written.
    pub async fn return_task(&self) -> Result<()> {
        let sent = self.connection.notify("task.return", None).await;
        debug!("Returning task");
        self.connection.close().await;
        sent?;
        Ok(())
    }

    /// Fetch the current task record from the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the host answers with an error.
    pub async fn get_task(&self) -> Result<Value> {
        Ok(self.connection.call("task.get", None).await?)
    }
}
