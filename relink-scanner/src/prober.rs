use crate::error::{MAX_ERROR_CHARS, Result, ScanError, describe_error};
use crate::progress::{ProgressCallback, ProgressUpdate};
use crate::result::{PageSample, ProbeMethod, ProbeResult};
use crate::signature::{MAX_BODY_BYTES, detect_signatures};
use futures::future::join_all;
use reqwest::Client;
use reqwest::header::{ACCEPT, RANGE};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Statuses where a HEAD answer is not trusted and a ranged GET is tried.
pub const RETRYABLE_STATUSES: &[u16] = &[
    400, 401, 403, 405, 406, 409, 418, 421, 429, 500, 501, 502, 503, 504, 520, 521, 525, 526, 530,
];

const USER_AGENT: &str = "Mozilla/5.0 (compatible; relink/0.2; +https://github.com/trapdoorsec/relink)";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

pub fn is_retryable(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Client and batch settings for a probing run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub concurrency: usize,
    pub progress_every: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub total_timeout: Duration,
    /// Last byte requested by ranged GETs.
    pub range_end: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: 80,
            progress_every: 500,
            connect_timeout: Duration::from_secs(8),
            read_timeout: Duration::from_secs(12),
            total_timeout: Duration::from_secs(20),
            range_end: 1024,
        }
    }
}

impl ProbeConfig {
    /// Settings for fetching page heads during a placeholder audit.
    pub fn inspection() -> Self {
        Self {
            progress_every: 250,
            read_timeout: Duration::from_secs(14),
            total_timeout: Duration::from_secs(22),
            range_end: 65_535,
            ..Self::default()
        }
    }

    /// Settings for validating freshly discovered homepages.
    pub fn discovery() -> Self {
        Self {
            concurrency: 60,
            progress_every: 100,
            connect_timeout: Duration::from_secs(6),
            read_timeout: Duration::from_secs(8),
            total_timeout: Duration::from_secs(14),
            range_end: 512,
        }
    }

    pub fn build_client(&self) -> Result<Client> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(ACCEPT, reqwest::header::HeaderValue::from_static(ACCEPT_HTML));

        Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(self.total_timeout)
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .pool_max_idle_per_host(self.concurrency.max(1) + 20)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .hickory_dns(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(ScanError::from)
    }
}

/// Bounded-concurrency link checker.
///
/// Every URL handed to [`Prober::probe_all`] or [`Prober::inspect_all`] yields
/// exactly one record, whatever happens to the request or the task running it.
pub struct Prober {
    client: Client,
    config: ProbeConfig,
    progress_callback: Option<ProgressCallback>,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Result<Self> {
        let client = config.build_client()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: ProbeConfig) -> Self {
        Self {
            client,
            config,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// HEAD every URL, escalating to a ranged GET where HEAD is refused or
    /// fails. Results come back in completion order.
    pub async fn probe_all(&self, urls: Vec<String>) -> Vec<ProbeResult> {
        let range_end = self.config.range_end;
        self.fan_out(
            urls,
            move |client, url| async move { probe_url(&client, url, range_end).await },
            ProbeResult::with_error,
        )
        .await
    }

    /// GET the head of every page and look for placeholder signatures.
    pub async fn inspect_all(&self, urls: Vec<String>) -> Vec<PageSample> {
        let range_end = self.config.range_end;
        self.fan_out(
            urls,
            move |client, url| async move { inspect_url(&client, url, range_end).await },
            PageSample::with_error,
        )
        .await
    }

    async fn fan_out<T, F, Fut>(
        &self,
        urls: Vec<String>,
        work: F,
        on_failure: fn(String, String) -> T,
    ) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(Client, String) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let total = urls.len();
        let concurrency = self.config.concurrency.max(1);
        info!("Checking {} URLs with concurrency {}", total, concurrency);

        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let completed = Arc::new(AtomicUsize::new(0));
        let every = self.config.progress_every;

        let mut handles = Vec::with_capacity(total);
        for url in urls {
            let client = self.client.clone();
            let semaphore = semaphore.clone();
            let completed = completed.clone();
            let progress_cb = self.progress_callback.clone();
            let work = work.clone();
            let task_url = url.clone();

            let handle = tokio::spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => work(client, task_url.clone()).await,
                    Err(e) => on_failure(task_url, e.to_string()),
                };

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref callback) = progress_cb
                    && ProgressUpdate::is_due(done, total, every)
                {
                    callback(ProgressUpdate {
                        completed: done,
                        total,
                        elapsed: started.elapsed(),
                    });
                }
                outcome
            });
            handles.push((url, handle));
        }

        let (urls, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let results: Vec<T> = urls
            .into_iter()
            .zip(joined)
            .map(|(url, outcome)| match outcome {
                Ok(result) => result,
                Err(e) => {
                    warn!("Probe task for {} failed: {}", url, e);
                    on_failure(url, describe_error(&e, MAX_ERROR_CHARS))
                }
            })
            .collect();

        info!(
            "Checked {} URLs in {:.1}s",
            results.len(),
            started.elapsed().as_secs_f64()
        );
        results
    }
}

/// Probe a single URL: HEAD first, ranged GET when HEAD is not conclusive.
pub async fn probe_url(client: &Client, url: String, range_end: u64) -> ProbeResult {
    debug!("HEAD {}", url);
    let mut result = ProbeResult::new(url);

    let escalate = match client.head(&result.url).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            result.status = i32::from(status);
            result.final_url = response.url().to_string();
            is_retryable(status)
        }
        Err(e) => {
            debug!("HEAD {} failed, falling back to GET: {}", result.url, e);
            true
        }
    };

    if escalate {
        result.method = ProbeMethod::Get;
        debug!("GET {} (bytes=0-{})", result.url, range_end);
        match client
            .get(&result.url)
            .header(RANGE, format!("bytes=0-{}", range_end))
            .send()
            .await
        {
            Ok(response) => {
                result.status = i32::from(response.status().as_u16());
                result.final_url = response.url().to_string();
            }
            Err(e) => {
                result.error = Some(describe_error(&e, MAX_ERROR_CHARS));
            }
        }
    }

    result.finish()
}

/// Liveness check used when vetting replacement candidates.
pub async fn head_status(client: &Client, url: &str) -> i32 {
    match client.head(url).send().await {
        Ok(response) => i32::from(response.status().as_u16()),
        Err(e) => {
            debug!("HEAD {} failed: {}", url, e);
            crate::result::TRANSPORT_FAILURE
        }
    }
}

async fn inspect_url(client: &Client, url: String, range_end: u64) -> PageSample {
    let mut sample = PageSample::new(url);
    if sample.url.is_empty() {
        sample.error = Some("empty_url".to_string());
        return sample;
    }

    debug!("GET {} for inspection", sample.url);
    let mut response = match client
        .get(&sample.url)
        .header(RANGE, format!("bytes=0-{}", range_end))
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            sample.error = Some(describe_error(&e, MAX_ERROR_CHARS));
            return sample;
        }
    };

    sample.status = i32::from(response.status().as_u16());
    sample.final_url = response.url().to_string();

    // Servers that ignore Range would otherwise stream the whole page.
    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                body.extend_from_slice(&chunk);
                if body.len() >= MAX_BODY_BYTES {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                sample.error = Some(describe_error(&e, MAX_ERROR_CHARS));
                break;
            }
        }
    }

    let text = String::from_utf8_lossy(&body);
    sample.signatures = detect_signatures(&text, &sample.final_url);
    sample.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn test_prober(concurrency: usize) -> Prober {
        let config = ProbeConfig {
            concurrency,
            progress_every: 2,
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            total_timeout: Duration::from_secs(5),
            range_end: 1024,
        };
        let client = Client::builder()
            .timeout(config.total_timeout)
            .build()
            .unwrap();
        Prober::with_client(client, config)
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(403));
        assert!(is_retryable(405));
        assert!(is_retryable(530));
        assert!(!is_retryable(404));
        assert!(!is_retryable(200));
        assert!(!is_retryable(410));
    }

    /// HEAD refused with 403, ranged GET redirects to the canonical page.
    #[tokio::test]
    async fn test_head_forbidden_escalates_to_ranged_get() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/pricing"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/pricing"))
            .and(header("range", "bytes=0-1024"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/", mock_server.uri())),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>acme</html>"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/pricing", mock_server.uri());
        let results = test_prober(4).probe_all(vec![url.clone()]).await;

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.url, url);
        assert_eq!(result.status, 200);
        assert_eq!(result.method, ProbeMethod::Get);
        assert_eq!(result.final_url, format!("{}/", mock_server.uri()));
        assert!(result.ok);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_plain_404_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let results = test_prober(4)
            .probe_all(vec![format!("{}/gone", mock_server.uri())])
            .await;

        assert_eq!(results[0].status, 404);
        assert_eq!(results[0].method, ProbeMethod::Head);
        assert!(!results[0].ok);
    }

    #[tokio::test]
    async fn test_head_success_keeps_head_method() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let results = test_prober(4).probe_all(vec![mock_server.uri()]).await;
        assert_eq!(results[0].method, ProbeMethod::Head);
        assert_eq!(results[0].status, 200);
        assert!(results[0].ok);
    }

    #[tokio::test]
    async fn test_transport_failure_degrades_to_sentinel() {
        // Nothing listens on port 9 of the loopback interface in test sandboxes.
        let results = test_prober(2)
            .probe_all(vec![
                "http://127.0.0.1:9/".to_string(),
                "not a url".to_string(),
            ])
            .await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.status, -1);
            assert_eq!(result.method, ProbeMethod::Get);
            assert!(!result.ok);
            let error = result.error.as_deref().unwrap_or_default();
            assert!(!error.is_empty());
            assert!(error.chars().count() <= MAX_ERROR_CHARS);
        }
    }

    #[tokio::test]
    async fn test_every_url_yields_one_result_and_progress_reaches_total() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(10)))
            .mount(&mock_server)
            .await;

        let urls: Vec<String> = (0..7)
            .map(|i| format!("{}/tool{}", mock_server.uri(), i))
            .collect();

        let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let updates_clone = updates.clone();
        let prober = test_prober(3).with_progress_callback(Arc::new(move |update| {
            updates_clone.lock().unwrap().push(update);
        }));

        let results = prober.probe_all(urls.clone()).await;

        let mut seen: Vec<String> = results.iter().map(|r| r.url.clone()).collect();
        seen.sort();
        let mut expected = urls;
        expected.sort();
        assert_eq!(seen, expected);
        assert!(results.iter().all(|r| r.ok == (200..400).contains(&r.status)));

        let updates = updates.lock().unwrap();
        let mut completions: Vec<usize> = updates.iter().map(|u| u.completed).collect();
        completions.sort();
        assert_eq!(completions, vec![2, 4, 6, 7]);
        assert!(updates.iter().all(|u| u.total == 7));
    }

    #[tokio::test]
    async fn test_inspection_demotes_parking_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body>Sedo Domain Parking</body></html>"),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/real"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body>Acme Writer helps you write</body></html>"),
            )
            .mount(&mock_server)
            .await;

        let parked = format!("{}/", mock_server.uri());
        let live = format!("{}/real", mock_server.uri());
        let mut samples = test_prober(2)
            .inspect_all(vec![parked.clone(), live.clone(), String::new()])
            .await;
        samples.sort_by(|a, b| a.url.cmp(&b.url));

        assert_eq!(samples[0].url, "");
        assert_eq!(samples[0].error.as_deref(), Some("empty_url"));

        let parked_sample = samples.iter().find(|s| s.url == parked).unwrap();
        assert_eq!(parked_sample.status, 200);
        assert_eq!(parked_sample.signatures, vec!["parking_sedo"]);
        assert!(!parked_sample.ok);
        assert!(parked_sample.is_placeholder());

        let live_sample = samples.iter().find(|s| s.url == live).unwrap();
        assert!(live_sample.ok);
        assert!(live_sample.signatures.is_empty());
    }

    #[tokio::test]
    async fn test_head_status_reports_sentinel_on_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = Client::new();
        assert_eq!(head_status(&client, &mock_server.uri()).await, 204);
        assert_eq!(head_status(&client, "http://127.0.0.1:9/").await, -1);
    }
}
