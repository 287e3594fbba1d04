//! Demo speech synthesis processor.
//!
//! Renders each chunk of the input text as a short tone sequence and stores
//! the whole utterance as a 16-bit mono WAV artifact. Progress moves
//! linearly with the number of chunks rendered.

use std::time::Duration;

use actors::{JobContext, ProcessError, ProcessFuture, Processor};
use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;

pub const DEFAULT_CHUNK_SIZE: usize = 120;
pub const SAMPLE_RATE: u32 = 16_000;
const SAMPLES_PER_CHAR: usize = 320;

/// Submission check for synthesis jobs.
pub fn validate(params: &Value) -> Result<(), String> {
    match params.get("text").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => {}
        Some(_) => return Err("text must not be empty".into()),
        None => return Err("missing required field: text".into()),
    }
    if let Some(size) = params.get("chunk_size")
        && size.as_u64().is_none_or(|n| n == 0)
    {
        return Err("chunk_size must be a positive integer".into());
    }
    Ok(())
}

/// Split text into chunks of at most `chunk_size` characters on word
/// boundaries. A single word longer than the limit becomes its own chunk.
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > chunk_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn render(chunk: &str, out: &mut Vec<i16>) {
    for c in chunk.chars() {
        if c.is_whitespace() {
            out.extend(std::iter::repeat_n(0, SAMPLES_PER_CHAR));
            continue;
        }
        let freq = 180.0 + (u32::from(c) % 24) as f32 * 15.0;
        out.extend((0..SAMPLES_PER_CHAR).map(|n| {
            let t = n as f32 / SAMPLE_RATE as f32;
            ((t * freq * std::f32::consts::TAU).sin() * 6_000.0) as i16
        }));
    }
}

/// Encode PCM samples as a 16-bit mono WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Bytes {
    let data_len = (samples.len() * 2) as u32;
    let mut buf = BytesMut::with_capacity(44 + data_len as usize);
    buf.put_slice(b"RIFF");
    buf.put_u32_le(36 + data_len);
    buf.put_slice(b"WAVE");
    buf.put_slice(b"fmt ");
    buf.put_u32_le(16);
    buf.put_u16_le(1); // PCM
    buf.put_u16_le(1); // mono
    buf.put_u32_le(sample_rate);
    buf.put_u32_le(sample_rate * 2);
    buf.put_u16_le(2);
    buf.put_u16_le(16);
    buf.put_slice(b"data");
    buf.put_u32_le(data_len);
    for sample in samples {
        buf.put_i16_le(*sample);
    }
    buf.freeze()
}

/// Processor turning `{"text": ..}` jobs into WAV artifacts.
#[derive(Debug, Clone)]
pub struct SynthProcessor {
    chunk_delay: Duration,
}

impl SynthProcessor {
    /// `chunk_delay` simulates model latency per chunk.
    pub fn new(chunk_delay: Duration) -> Self {
        Self { chunk_delay }
    }
}

impl Default for SynthProcessor {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

impl Processor for SynthProcessor {
    fn process(&self, ctx: JobContext) -> ProcessFuture {
        let delay = self.chunk_delay;
        Box::pin(async move {
            let params = ctx.params();
            let text = params
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| ProcessError::Failed("missing required field: text".into()))?
                .to_string();
            let chunk_size = params
                .get("chunk_size")
                .and_then(Value::as_u64)
                .map_or(DEFAULT_CHUNK_SIZE, |n| n as usize);
            let split = params
                .get("split_text")
                .and_then(Value::as_bool)
                .unwrap_or(true);

            let chunks = if split {
                split_text(&text, chunk_size)
            } else {
                vec![text.clone()]
            };
            let total = chunks.len().max(1) as u32;
            tracing::debug!("Job {}: {} chunks", ctx.id(), total);
            ctx.set_steps(0, total);

            let mut samples = Vec::new();
            for (i, chunk) in chunks.iter().enumerate() {
                ctx.checkpoint()?;
                render(chunk, &mut samples);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let done = i as u32 + 1;
                ctx.set_steps(done, total);
                ctx.set_progress((done * 100 / total) as u8);
            }
            ctx.checkpoint()?;

            let wav = encode_wav(&samples, SAMPLE_RATE);
            let artifact = ctx.storage().put(&format!("{}.wav", ctx.id()), wav).await?;
            Ok::<_, ProcessError>(artifact)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actors::{JobEvent, JobQueue, JobState};
    use serde_json::json;

    #[test]
    fn split_text_packs_words_up_to_the_limit() {
        let chunks = split_text("one two three four five", 9);
        assert_eq!(chunks, vec!["one two", "three", "four five"]);
        assert!(chunks.iter().all(|c| c.len() <= 9));

        assert_eq!(split_text("supercalifragilistic x", 5), vec![
            "supercalifragilistic",
            "x"
        ]);
        assert!(split_text("   ", 10).is_empty());
    }

    #[test]
    fn wav_header_describes_the_samples() {
        let wav = encode_wav(&[0, 1, -1], 16_000);
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 6);
    }

    #[test]
    fn validation_requires_text() {
        assert!(validate(&json!({ "text": "hello" })).is_ok());
        assert!(validate(&json!({ "text": "  " })).is_err());
        assert!(validate(&json!({ "voice": "a" })).is_err());
        assert!(validate(&json!({ "text": "hi", "chunk_size": 0 })).is_err());
        assert!(validate(&json!({ "text": "hi", "chunk_size": 40 })).is_ok());
    }

    #[tokio::test]
    async fn synthesizes_chunks_into_a_wav_artifact() {
        let queue = JobQueue::builder(SynthProcessor::new(Duration::ZERO))
            .with_validator(validate)
            .start()
            .await
            .unwrap();

        let text = "the quick brown fox jumps over the lazy dog";
        let id = queue
            .submit(json!({ "text": text, "chunk_size": 10 }))
            .unwrap();

        let job = loop {
            let job = queue.status(id).unwrap();
            if job.is_terminal() {
                break job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        assert_eq!(job.state(), JobState::Completed);
        let expected = split_text(text, 10).len() as u32;
        assert_eq!(job.total_steps, Some(expected));
        assert_eq!(job.current_step, Some(expected));

        let artifact = queue.fetch_result(id).unwrap();
        let wav = queue.storage().get(&artifact).await.unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        let rendered: usize = split_text(text, 10).iter().map(|c| c.chars().count()).sum();
        assert_eq!(wav.len(), 44 + rendered * SAMPLES_PER_CHAR * 2);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn chunk_total_is_published_before_the_first_chunk() {
        let queue = JobQueue::builder(SynthProcessor::new(Duration::from_millis(20)))
            .with_validator(validate)
            .start()
            .await
            .unwrap();
        let mut events = queue.subscribe();

        let text = "one two three four five six seven eight";
        let id = queue
            .submit(json!({ "text": text, "chunk_size": 10 }))
            .unwrap();
        let expected = split_text(text, 10).len() as u32;

        let first = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Ok(JobEvent::JobProgress {
                        job_id,
                        progress,
                        current_step,
                        total_steps,
                        ..
                    }) if job_id == id => break (progress, current_step, total_steps),
                    Ok(_) => continue,
                    Err(e) => panic!("event stream ended: {e}"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(first, (0, Some(0), Some(expected)));

        queue.shutdown().await;
    }
}
