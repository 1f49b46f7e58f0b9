use crate::error::AppError;
use crate::models::predict_types::{ImageReference, ImageSource, PredictionResult, WorkflowState};
use crate::services::acquisition::{Acquisition, ImagePicker, PermissionGate};
use crate::services::transport::{PredictError, TransportClient};
use std::sync::{Arc, Mutex};

/// Shown when the server answered but the body was not a prediction.
const MSG_PREDICT_FAILED: &str = "Failed to predict";
/// Shown when the request itself failed (timeout, DNS, non-2xx).
const MSG_TRANSPORT_FAILED: &str = "Failed to predicting.";

type StateObserver = Arc<dyn Fn(&WorkflowState) + Send + Sync>;

/// Orchestrates one end-to-end prediction per user gesture and owns the
/// session's `WorkflowState`. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PredictionWorkflow {
    transport: Arc<TransportClient>,
    state: Arc<Mutex<WorkflowState>>,
    image: Arc<Mutex<Option<ImageReference>>>,
    observer: Option<StateObserver>,
}

impl PredictionWorkflow {
    pub fn new(transport: TransportClient) -> Self {
        Self {
            transport: Arc::new(transport),
            state: Arc::new(Mutex::new(WorkflowState::Idle)),
            image: Arc::new(Mutex::new(None)),
            observer: None,
        }
    }

    /// Register a callback fired after every state transition.
    pub fn with_observer(
        mut self,
        observer: impl Fn(&WorkflowState) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn state(&self) -> WorkflowState {
        self.state.lock().unwrap().clone()
    }

    pub fn current_image(&self) -> Option<ImageReference> {
        self.image.lock().unwrap().clone()
    }

    /// Reset to `Idle` and drop the held image. Infallible, idempotent.
    pub fn clear(&self) {
        self.image.lock().unwrap().take();
        self.set_state(WorkflowState::Idle);
    }

    /// Obtain an image from the picker, permission check first. Denial
    /// and cancellation abort without touching `WorkflowState`.
    pub fn start_acquisition(
        &self,
        source: ImageSource,
        gate: &dyn PermissionGate,
        picker: &dyn ImagePicker,
    ) -> Result<Acquisition, AppError> {
        if !gate.is_granted(source) {
            log::warn!("acquisition from {:?} denied by permission gate", source);
            return Ok(Acquisition::Denied);
        }

        match picker.pick(source)? {
            Some(image) => {
                *self.image.lock().unwrap() = Some(image.clone());
                Ok(Acquisition::Image(image))
            }
            None => Ok(Acquisition::Cancelled),
        }
    }

    /// The core operation: transition to `Predicting`, upload, and
    /// reconcile the response into a terminal state. At most one
    /// submission may be in flight; a second is refused without
    /// disturbing the one already running.
    pub async fn submit(&self, image: ImageReference) -> Result<WorkflowState, AppError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.is_predicting() {
                return Err("A prediction is already in flight".into());
            }
            *state = WorkflowState::Predicting;
        }
        self.notify(&WorkflowState::Predicting);

        *self.image.lock().unwrap() = Some(image.clone());

        let next = match self.transport.predict(&image).await {
            Ok(response) => match (response.class, response.confidence) {
                (Some(label), Some(confidence)) => {
                    WorkflowState::Succeeded(PredictionResult { label, confidence })
                }
                _ => WorkflowState::Failed {
                    message: MSG_PREDICT_FAILED.to_string(),
                },
            },
            Err(PredictError::Malformed) => WorkflowState::Failed {
                message: MSG_PREDICT_FAILED.to_string(),
            },
            Err(err) => {
                log::warn!("prediction request failed: {}", err);
                WorkflowState::Failed {
                    message: MSG_TRANSPORT_FAILED.to_string(),
                }
            }
        };

        Ok(self.set_state(next))
    }

    fn set_state(&self, next: WorkflowState) -> WorkflowState {
        {
            let mut state = self.state.lock().unwrap();
            *state = next.clone();
        }
        self.notify(&next);
        next
    }

    fn notify(&self, state: &WorkflowState) {
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct AllowAll;
    impl PermissionGate for AllowAll {
        fn is_granted(&self, _source: ImageSource) -> bool {
            true
        }
    }

    struct DenyAll;
    impl PermissionGate for DenyAll {
        fn is_granted(&self, _source: ImageSource) -> bool {
            false
        }
    }

    struct StubPicker(Option<ImageReference>);
    impl ImagePicker for StubPicker {
        fn pick(&self, _source: ImageSource) -> Result<Option<ImageReference>, AppError> {
            Ok(self.0.clone())
        }
    }

    fn temp_image(name: &str) -> ImageReference {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, b"leaf bytes").unwrap();
        ImageReference::from_path(path)
    }

    /// One-shot server: reads the upload, waits `delay`, answers `body`.
    async fn serve_json(body: &'static str, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if request.ends_with(b"--\r\n") {
                    break;
                }
            }
            tokio::time::sleep(delay).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn workflow_for(base: &str) -> PredictionWorkflow {
        PredictionWorkflow::new(TransportClient::new(base).unwrap())
    }

    #[tokio::test]
    async fn submit_reaches_succeeded_through_predicting() {
        let base = serve_json(
            r#"{"class": "Late Blight", "confidence": 87.5}"#,
            Duration::ZERO,
        )
        .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_observer = seen.clone();
        let workflow = PredictionWorkflow::new(TransportClient::new(&base).unwrap())
            .with_observer(move |state| {
                seen_by_observer.lock().unwrap().push(state.clone());
            });

        let terminal = workflow
            .submit(temp_image("leaf-lense-wf-ok.jpg"))
            .await
            .unwrap();

        let expected = WorkflowState::Succeeded(PredictionResult {
            label: "Late Blight".to_string(),
            confidence: 87.5,
        });
        assert_eq!(terminal, expected);
        assert_eq!(workflow.state(), expected);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], WorkflowState::Predicting);
        assert_eq!(seen[1], expected);
    }

    #[tokio::test]
    async fn missing_class_reconciles_to_predict_failure() {
        let base = serve_json(r#"{"confidence": 12.0}"#, Duration::ZERO).await;
        let workflow = workflow_for(&base);

        let terminal = workflow
            .submit(temp_image("leaf-lense-wf-noclass.jpg"))
            .await
            .unwrap();

        assert_eq!(
            terminal,
            WorkflowState::Failed {
                message: "Failed to predict".to_string()
            }
        );
    }

    #[tokio::test]
    async fn garbage_body_reconciles_to_predict_failure() {
        let base = serve_json("<html>err</html>", Duration::ZERO).await;
        let workflow = workflow_for(&base);

        let terminal = workflow
            .submit(temp_image("leaf-lense-wf-garbage.jpg"))
            .await
            .unwrap();

        assert_eq!(
            terminal,
            WorkflowState::Failed {
                message: "Failed to predict".to_string()
            }
        );
    }

    #[tokio::test]
    async fn timeout_reconciles_to_transport_failure() {
        // Server that never answers within the client timeout.
        let base = serve_json("{}", Duration::from_secs(30)).await;
        let transport =
            TransportClient::with_timeout(&base, Duration::from_millis(100)).unwrap();
        let workflow = PredictionWorkflow::new(transport);

        let terminal = workflow
            .submit(temp_image("leaf-lense-wf-timeout.jpg"))
            .await
            .unwrap();

        assert_eq!(
            terminal,
            WorkflowState::Failed {
                message: "Failed to predicting.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_reconciles_to_transport_failure() {
        // Port 9 (discard) is not listening.
        let workflow = workflow_for("http://127.0.0.1:9");

        let terminal = workflow
            .submit(temp_image("leaf-lense-wf-conn.jpg"))
            .await
            .unwrap();

        assert!(matches!(terminal, WorkflowState::Failed { ref message }
            if message == "Failed to predicting."));
    }

    #[tokio::test]
    async fn second_submit_refused_while_predicting() {
        let base = serve_json(
            r#"{"class": "Healthy", "confidence": 99.0}"#,
            Duration::from_millis(300),
        )
        .await;
        let workflow = workflow_for(&base);

        let racing = workflow.clone();
        let first = tokio::spawn(async move {
            racing.submit(temp_image("leaf-lense-wf-race1.jpg")).await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(workflow.state().is_predicting());
        let refused = workflow
            .submit(temp_image("leaf-lense-wf-race2.jpg"))
            .await;
        assert!(refused.is_err());

        let terminal = first.await.unwrap().unwrap();
        assert!(matches!(terminal, WorkflowState::Succeeded(_)));
        assert_eq!(workflow.state(), terminal);
    }

    #[tokio::test]
    async fn clear_is_idempotent_from_any_state() {
        let base = serve_json(r#"{"confidence": 1.0}"#, Duration::ZERO).await;
        let workflow = workflow_for(&base);

        workflow
            .submit(temp_image("leaf-lense-wf-clear.jpg"))
            .await
            .unwrap();
        assert!(matches!(workflow.state(), WorkflowState::Failed { .. }));
        assert!(workflow.current_image().is_some());

        workflow.clear();
        assert_eq!(workflow.state(), WorkflowState::Idle);
        assert!(workflow.current_image().is_none());

        workflow.clear();
        assert_eq!(workflow.state(), WorkflowState::Idle);
        assert!(workflow.current_image().is_none());
    }

    #[tokio::test]
    async fn denied_permission_leaves_state_untouched() {
        let workflow = workflow_for("http://127.0.0.1:9");
        let picker = StubPicker(Some(ImageReference::from_path("/tmp/unused.jpg")));

        let before = workflow.state();
        let acquired = workflow
            .start_acquisition(ImageSource::Camera, &DenyAll, &picker)
            .unwrap();

        assert_eq!(acquired, Acquisition::Denied);
        assert_eq!(workflow.state(), before);
        assert!(workflow.current_image().is_none());
    }

    #[tokio::test]
    async fn cancelled_picker_leaves_state_untouched() {
        let workflow = workflow_for("http://127.0.0.1:9");

        let acquired = workflow
            .start_acquisition(ImageSource::Library, &AllowAll, &StubPicker(None))
            .unwrap();

        assert_eq!(acquired, Acquisition::Cancelled);
        assert_eq!(workflow.state(), WorkflowState::Idle);
        assert!(workflow.current_image().is_none());
    }

    #[tokio::test]
    async fn successful_acquisition_holds_the_image() {
        let workflow = workflow_for("http://127.0.0.1:9");
        let image = ImageReference::from_path(PathBuf::from("/photos/leaf.jpg"));

        let acquired = workflow
            .start_acquisition(
                ImageSource::Library,
                &AllowAll,
                &StubPicker(Some(image.clone())),
            )
            .unwrap();

        assert_eq!(acquired, Acquisition::Image(image.clone()));
        assert_eq!(workflow.current_image(), Some(image));
        // Acquisition alone never moves the state machine.
        assert_eq!(workflow.state(), WorkflowState::Idle);
    }
}
