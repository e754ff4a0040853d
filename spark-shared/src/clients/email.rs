use reqwest::Client;
use serde::Serialize;

#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_url: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered but refused the message. 4xx rejections will not succeed on retry.
    #[error("email API returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl EmailError {
    pub fn is_permanent(&self) -> bool {
        match self {
            EmailError::Transport(_) => false,
            EmailError::Rejected { status, .. } => (400..500).contains(status) && *status != 429,
        }
    }
}

impl EmailClient {
    pub fn new(api_url: &str, api_key: &str, from_email: &str, from_name: &str, timeout: std::time::Duration) -> Result<Self, EmailError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        })
    }

    pub async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        let request = ResendRequest {
            from: format!("{} <{}>", self.from_name, self.from_email),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };

        let response = self.client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected { status: status.as_u16(), body });
        }

        tracing::debug!(to = %to, subject = %subject, "email sent");
        Ok(())
    }

    /// Sends a plain notification message wrapped in the Spark email layout.
    pub async fn send_notification(&self, to: &str, subject: &str, message: &str) -> Result<(), EmailError> {
        self.send_email(to, subject, &render_notification(subject, message)).await
    }
}

pub fn render_notification(subject: &str, message: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2 style="color: #e11d48;">{}</h2>
            <p style="font-size: 16px;">{}</p>
            <p style="color: #666; margin-top: 20px;">Open Spark to say hello.</p>
            </div>"#,
        escape_html(subject),
        escape_html(message),
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
