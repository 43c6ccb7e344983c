use std::{pin::Pin, sync::Arc, time::SystemTime};

use futures::{Stream, StreamExt};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            payload: f(self.payload),
            received_at: self.received_at,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("transform error: {0}")]
    Transform(String),
    #[error("sink error: {0}")]
    Sink(String),
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

/// Source, then same-type checks in order, then one stage producing the sink's input.
pub struct Pipeline<S, I, O, K> {
    pub source: S,
    pub checks: Vec<Arc<dyn Transform<I, I> + Send + Sync>>,
    pub stage: Arc<dyn Transform<I, O> + Send + Sync>,
    pub sink: K,
}

impl<S, I, O, K> Pipeline<S, I, O, K>
where
    I: Send + 'static,
    O: Send + 'static,
    S: Source<I> + Send + Sync + 'static,
    K: Sink<O> + Send + Sync + 'static,
{
    pub async fn run(self) -> Result<(), PipelineError> {
        let mut stream = self.source.stream().await;

        for t in self.checks {
            let t_arc = t.clone();
            stream = Box::pin(stream.then(move |item| {
                let t_inner = t_arc.clone();
                async move {
                    match item {
                        Ok(env) => t_inner.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        let stage = self.stage.clone();
        let output: EnvelopeStream<O> = Box::pin(stream.then(move |item| {
            let stage = stage.clone();
            async move {
                match item {
                    Ok(env) => stage.apply(env).await,
                    Err(e) => Err(e),
                }
            }
        }));

        self.sink.run(output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Numbers(Vec<i64>);

    #[async_trait::async_trait]
    impl Source<i64> for Numbers {
        async fn stream(&self) -> EnvelopeStream<i64> {
            let items: Vec<_> = self.0.iter().map(|n| Ok(Envelope::new(*n))).collect();
            Box::pin(futures::stream::iter(items))
        }
    }

    struct RejectNegative;

    #[async_trait::async_trait]
    impl Transform<i64, i64> for RejectNegative {
        async fn apply(&self, input: Envelope<i64>) -> Result<Envelope<i64>, PipelineError> {
            if input.payload < 0 {
                return Err(PipelineError::Transform("negative".to_string()));
            }
            Ok(input)
        }
    }

    struct Describe;

    #[async_trait::async_trait]
    impl Transform<i64, String> for Describe {
        async fn apply(&self, input: Envelope<i64>) -> Result<Envelope<String>, PipelineError> {
            Ok(input.map(|n| format!("n={n}")))
        }
    }

    #[derive(Default)]
    struct Collect {
        ok: Mutex<Vec<String>>,
        errors: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl Sink<String> for Arc<Collect> {
        async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
        where
            S: Stream<Item = Result<Envelope<String>, PipelineError>> + Send + Unpin + 'static,
        {
            while let Some(item) = input.next().await {
                match item {
                    Ok(env) => self.ok.lock().unwrap().push(env.payload),
                    Err(_) => *self.errors.lock().unwrap() += 1,
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn checks_run_before_stage_and_errors_reach_sink() {
        let sink = Arc::new(Collect::default());
        let pipeline: Pipeline<_, i64, String, _> = Pipeline {
            source: Numbers(vec![1, -2, 3]),
            checks: vec![Arc::new(RejectNegative)],
            stage: Arc::new(Describe),
            sink: sink.clone(),
        };

        pipeline.run().await.unwrap();

        assert_eq!(*sink.ok.lock().unwrap(), vec!["n=1".to_string(), "n=3".to_string()]);
        assert_eq!(*sink.errors.lock().unwrap(), 1);
    }
}
