use serde::Serialize;
use serde_json::Value;
use tinytemplate::{error::Error, format, TinyTemplate};

const OTP_TEMPLATE_NAME: &str = "otp-email";
const ADMIN_TEMPLATE_NAME: &str = "admin-notification";
const CONFIRMATION_TEMPLATE_NAME: &str = "confirmation-email";

const OTP_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/otp-email.html"
));
const ADMIN_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/admin-notification.html"
));
const CONFIRMATION_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/confirmation-email.html"
));

#[derive(Serialize)]
struct OtpContext<'a> {
    code: &'a str,
}

#[derive(Serialize)]
struct AdminContext<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct ConfirmationContext<'a> {
    name: &'a str,
    subject: &'a str,
    message: &'a str,
}

pub fn render_otp_email(code: &str) -> String {
    templates().render(OTP_TEMPLATE_NAME, &OtpContext { code }).unwrap()
}

pub fn render_admin_notification(name: &str, email: &str, subject: &str, message: &str) -> String {
    templates()
        .render(
            ADMIN_TEMPLATE_NAME,
            &AdminContext {
                name,
                email,
                subject,
                message,
            },
        )
        .unwrap()
}

pub fn render_confirmation(name: &str, subject: &str, message: &str) -> String {
    templates()
        .render(
            CONFIRMATION_TEMPLATE_NAME,
            &ConfirmationContext {
                name,
                subject,
                message,
            },
        )
        .unwrap()
}

fn templates() -> TinyTemplate<'static> {
    let mut tt = TinyTemplate::new();
    tt.add_formatter("render_paragraphs", render_paragraphs);
    tt.add_template(OTP_TEMPLATE_NAME, OTP_TEMPLATE).unwrap();
    tt.add_template(ADMIN_TEMPLATE_NAME, ADMIN_TEMPLATE).unwrap();
    tt.add_template(CONFIRMATION_TEMPLATE_NAME, CONFIRMATION_TEMPLATE)
        .unwrap();
    tt
}

fn render_paragraphs(value: &Value, output: &mut String) -> Result<(), Error> {
    output.push_str("<p>");
    let mut formatted = String::new();
    format(value, &mut formatted)?;
    output.push_str(&formatted.replace("\n\n", "</p><p>"));
    output.push_str("</p>");
    Ok(())
}
