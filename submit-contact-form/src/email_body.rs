use serde::Serialize;
use serde_json::Value;
use tinytemplate::{error::Error, format, format_unescaped, TinyTemplate};

const HTML_TEMPLATE_NAME: &str = "contact-email-html";
const TEXT_TEMPLATE_NAME: &str = "contact-email-text";
const HTML_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/contact-email.html"
));
const TEXT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/contact-email.txt"
));

#[derive(Serialize)]
struct Context<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
}

pub struct EmailBody {
    pub html: String,
    pub text: String,
}

/// Renders both alternatives of the notification mail. User input is HTML-escaped in the HTML
/// variant and embedded verbatim in the plain-text one.
pub fn render_email_body(
    name: &str,
    email: &str,
    subject: &str,
    message: &str,
) -> Result<EmailBody, Error> {
    let context = Context {
        name,
        email,
        subject,
        message,
    };

    let mut html = TinyTemplate::new();
    html.add_formatter("render_line_breaks", render_line_breaks);
    html.add_template(HTML_TEMPLATE_NAME, HTML_TEMPLATE)?;

    let mut text = TinyTemplate::new();
    text.set_default_formatter(&format_unescaped);
    text.add_template(TEXT_TEMPLATE_NAME, TEXT_TEMPLATE)?;

    Ok(EmailBody {
        html: html.render(HTML_TEMPLATE_NAME, &context)?,
        text: text.render(TEXT_TEMPLATE_NAME, &context)?,
    })
}

fn render_line_breaks(value: &Value, output: &mut String) -> Result<(), Error> {
    let mut escaped = String::new();
    format(value, &mut escaped)?;
    output.push_str(&escaped.replace("\r\n", "<br>").replace('\n', "<br>"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::render_email_body;
    use googletest::prelude::*;

    const MALICIOUS_CONTENT: &str = "<script>doEvil();</script>";

    #[test]
    fn converts_newlines_to_line_breaks_in_html() -> Result<()> {
        let body = render_email_body("Ada", "ada@example.com", "Hi", "Hello\nWorld").unwrap();

        verify_that!(body.html, contains_substring("Hello<br>World"))
    }

    #[test]
    fn converts_crlf_line_endings_to_single_line_break() -> Result<()> {
        let body = render_email_body("Ada", "ada@example.com", "Hi", "Hello\r\nWorld").unwrap();

        verify_that!(body.html, contains_substring("Hello<br>World"))
    }

    #[test]
    fn keeps_newlines_in_plain_text() -> Result<()> {
        let body = render_email_body("Ada", "ada@example.com", "Hi", "Hello\nWorld").unwrap();

        verify_that!(body.text, contains_substring("Hello\nWorld"))
    }

    #[test]
    fn renders_sender_and_subject() -> Result<()> {
        let body = render_email_body("Ada", "ada@example.com", "Hi", "Hello").unwrap();

        verify_that!(body.html, contains_substring("Ada (ada@example.com)"))?;
        verify_that!(body.text, contains_substring("From: Ada (ada@example.com)"))?;
        verify_that!(body.text, contains_substring("Subject: Hi"))
    }

    #[test]
    fn escapes_user_input_in_html() -> Result<()> {
        let body =
            render_email_body(MALICIOUS_CONTENT, "ada@example.com", MALICIOUS_CONTENT, MALICIOUS_CONTENT)
                .unwrap();

        verify_that!(body.html, not(contains_substring(MALICIOUS_CONTENT)))
    }

    #[test]
    fn does_not_escape_plain_text() -> Result<()> {
        let body = render_email_body("Ada", "ada@example.com", "Hi", "1 < 2 & 3 > 2").unwrap();

        verify_that!(body.text, contains_substring("1 < 2 & 3 > 2"))
    }
}
