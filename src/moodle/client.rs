// src/moodle/client.rs
// =============================================================================
// Talks to Moodle's REST web service.
//
// Every call is a POST to {base}/webservice/rest/server.php with the
// function name, the token and the response format as query parameters:
//
//   ?wstoken=...&wsfunction=core_course_get_courses&moodlewsrestformat=json
//
// Moodle answers errors with HTTP 200 and a body like
//   {"exception": "...", "errorcode": "invalidtoken", "message": "..."}
// so every body is checked for that shape before decoding.
// =============================================================================

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::{LinkSource, SourceError};
use crate::checker::{extract_html_links, DiscoveredLink, OriginContext};

const REST_PATH: &str = "webservice/rest/server.php";
const GET_COURSES: &str = "core_course_get_courses";
const GET_ASSIGNMENTS: &str = "mod_assign_get_assignments";

#[derive(Debug, Clone, Deserialize)]
pub struct Course {
    pub id: u64,
    #[serde(default)]
    pub shortname: String,
    #[serde(default)]
    pub fullname: String,
    /// "site" marks the front page pseudo-course
    #[serde(default)]
    pub format: Option<String>,
}

impl Course {
    fn display_name(&self) -> String {
        if !self.shortname.trim().is_empty() {
            self.shortname.clone()
        } else if !self.fullname.trim().is_empty() {
            self.fullname.clone()
        } else {
            format!("Course {}", self.id)
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssignmentsResponse {
    #[serde(default)]
    courses: Vec<CourseAssignments>,
}

#[derive(Debug, Deserialize)]
struct CourseAssignments {
    #[serde(flatten)]
    course: Course,
    #[serde(default)]
    assignments: Vec<Assignment>,
}

#[derive(Debug, Deserialize)]
struct Assignment {
    #[serde(default)]
    name: String,
    #[serde(default)]
    intro: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MoodleException {
    #[serde(default)]
    errorcode: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct MoodleClient {
    http: Client,
    endpoint: Url,
    token: Option<String>,
    concurrency: usize,
}

impl MoodleClient {
    pub fn new(
        http: Client,
        base_url: &str,
        token: Option<String>,
        concurrency: usize,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            http,
            endpoint: endpoint_for(base_url)?,
            token,
            concurrency: concurrency.max(1),
        })
    }

    // Lists every real course on the site (the front page is left out)
    pub async fn courses(&self) -> Result<Vec<Course>, SourceError> {
        let courses: Vec<Course> = self.call(GET_COURSES, &[]).await?;
        Ok(courses
            .into_iter()
            .filter(|course| course.format.as_deref() != Some("site"))
            .collect())
    }

    // Returns the links in every assignment intro of one course
    pub async fn assignment_links(&self, course_id: u64) -> Result<Vec<DiscoveredLink>, SourceError> {
        let response: AssignmentsResponse = self
            .call(GET_ASSIGNMENTS, &[("courseids[0]", course_id.to_string())])
            .await?;

        let links: Vec<DiscoveredLink> = response
            .courses
            .iter()
            .flat_map(|entry| {
                let group = entry.course.display_name();
                entry.assignments.iter().flat_map(move |assignment| {
                    let origin = OriginContext::new(group.clone(), assignment.name.clone());
                    extract_html_links(assignment.intro.as_deref().unwrap_or_default(), &origin)
                })
            })
            .collect();

        tracing::debug!(course_id, links = links.len(), "collected assignment links");
        Ok(links)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        function: &str,
        params: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let mut query: Vec<(&str, String)> = vec![
            ("wsfunction", function.to_string()),
            ("moodlewsrestformat", "json".to_string()),
        ];
        if let Some(token) = &self.token {
            query.push(("wstoken", token.clone()));
        }
        query.extend(params.iter().cloned());

        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&query)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| SourceError::Http {
                function: function.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                function: function.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| SourceError::Http {
            function: function.to_string(),
            source,
        })?;
        decode_response(function, &body)
    }
}

#[async_trait]
impl LinkSource for MoodleClient {
    async fn fetch_links(&self) -> Result<Vec<DiscoveredLink>, SourceError> {
        let courses = self.courses().await?;
        tracing::info!(courses = courses.len(), "fetching assignments");

        let per_course: Vec<Vec<DiscoveredLink>> = stream::iter(courses)
            .map(|course| async move { self.assignment_links(course.id).await })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        Ok(per_course.into_iter().flatten().collect())
    }
}

// "https://lms.example.org/moodle" -> "https://lms.example.org/moodle/webservice/rest/server.php"
fn endpoint_for(base_url: &str) -> Result<Url, SourceError> {
    let invalid = |reason: String| SourceError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };

    let mut base = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https".to_string()));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(REST_PATH).map_err(|e| invalid(e.to_string()))
}

fn decode_response<T: DeserializeOwned>(function: &str, body: &str) -> Result<T, SourceError> {
    let decode = |source| SourceError::Decode {
        function: function.to_string(),
        source,
    };

    let value: serde_json::Value = serde_json::from_str(body).map_err(decode)?;
    if value.get("exception").is_some() {
        let exception: MoodleException = serde_json::from_value(value).map_err(decode)?;
        return Err(SourceError::Moodle {
            function: function.to_string(),
            errorcode: exception.errorcode.unwrap_or_else(|| "unknown".to_string()),
            message: exception.message.unwrap_or_default(),
        });
    }
    serde_json::from_value(value).map_err(decode)
}
