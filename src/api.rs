/// file: src/api.rs
/// description: REST client for the platform's count, search and availability endpoints
use crate::{
    config::ApiConfig,
    counters::CountSource,
    error::{Result, SkillSwapError},
    types::{
        CountResponse, CounterKind, EmailAvailability, EmailCheckRequest, SkillSearchRequest,
        SkillSearchResponse,
    },
    validation::{MIN_SEARCH_LEN, validate_email},
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

const SKILL_SEARCH_ENDPOINT: &str = "api/skills/search";
const CHECK_EMAIL_ENDPOINT: &str = "api/check-email";

#[derive(Clone)]
pub struct SkillSwapApi {
    base_url: Url,
    client: Client,
}

impl SkillSwapApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            base_url: config.base_url.clone(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(SkillSwapError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    pub async fn count(&self, kind: CounterKind) -> Result<u64> {
        let url = self.endpoint(kind.endpoint())?;
        trace!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let body: CountResponse = Self::decode(kind.endpoint(), response).await?;
        debug!("{} count: {}", kind, body.count);
        Ok(body.count)
    }

    /// Skill name suggestions. Queries shorter than two characters return
    /// nothing without a request.
    pub async fn search_skills(&self, query: &str) -> Result<Vec<String>> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.endpoint(SKILL_SEARCH_ENDPOINT)?)
            .json(&SkillSearchRequest { search: query })
            .send()
            .await?;
        let body: SkillSearchResponse = Self::decode(SKILL_SEARCH_ENDPOINT, response).await?;
        Ok(body.skills)
    }

    /// `None` when `email` is empty or not a valid address; the server is
    /// only asked about well-formed ones.
    pub async fn check_email(&self, email: &str) -> Result<Option<EmailAvailability>> {
        let email = email.trim();
        if email.is_empty() || !validate_email(email) {
            return Ok(None);
        }

        let response = self
            .client
            .post(self.endpoint(CHECK_EMAIL_ENDPOINT)?)
            .json(&EmailCheckRequest { email })
            .send()
            .await?;
        Ok(Some(Self::decode(CHECK_EMAIL_ENDPOINT, response).await?))
    }
}

#[async_trait]
impl CountSource for SkillSwapApi {
    async fn fetch_count(&self, kind: CounterKind) -> Result<u64> {
        self.count(kind).await
    }
}
