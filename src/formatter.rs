//! Renders notifications into a subject line and a self-contained HTML body.
//!
//! Every kind of email has a Handlebars subject and body template, registered once
//! when the [`Formatter`] is built. `{{value}}` expressions are HTML-escaped by the
//! engine; subjects are plain text and use `{{{value}}}`.
//!
//! Rendering is pure: the same notification and branding always produce the same
//! bytes, and nothing here touches the network or the clock.

use std::sync::Arc;

use chrono::NaiveDate;
use handlebars::Handlebars;
use serde_json::{json, Value};
use tracing::error;

use crate::accounts::DATE_FORMAT;
use crate::errors::{AcademyError, AcademyResult};
use crate::notifications::{
    AccountDeactivated, AccountStatusChanged, Notification, PaymentConfirmed, PaymentReminder,
    PlatformsAssigned, ScholarshipGranted, StatusChange,
};

const SIGNATURE: &str = "<p>Atentamente,<br>El equipo de <strong>{{academy}}</strong>.</p>";

/// `(name, subject, body)` for every notification kind.
const TEMPLATES: [(&str, &str, &str); 6] = [
    (
        "payment_confirmed",
        "Confirmación de Pago - {{{academy}}}",
        "<html><body>\
         <h2>¡Gracias por tu pago, {{name}}!</h2>\
         <p>Hemos registrado correctamente tu pago en nuestro sistema.</p>\
         <ul><li><strong>Monto Pagado:</strong> {{amount}}</li>\
         <li><strong>Fecha de Pago:</strong> {{paid_on}}</li></ul>\
         {{#if balance}}\
         <p><strong>Importante:</strong> Tienes un saldo pendiente de <strong>{{balance.amount}}</strong>. \
         Tienes hasta el <strong>{{balance.deadline}}</strong> para completarlo.</p>\
         {{else}}\
         <p>¡Excelente! No tienes deudas pendientes.</p>\
         {{/if}}\
         <p>Gracias por ser parte de <strong>{{academy}}</strong>.</p>\
         </body></html>",
    ),
    (
        "payment_reminder",
        "Recordatorio de Pago Pendiente - {{{academy}}}",
        "<html><body>\
         <h2>Recordatorio de Pago, {{name}}</h2>\
         <p>Te escribimos para recordarte que tienes un pago pendiente con la academia.</p>\
         <ul><li><strong>Monto a Pagar:</strong> {{amount}}</li>\
         <li><strong>Fecha de Vencimiento:</strong> {{due}}</li></ul>\
         <p>Por favor, realiza tu pago a la brevedad para evitar la desactivación de tu cuenta.</p>\
         {{> signature}}\
         </body></html>",
    ),
    (
        "scholarship_granted",
        "¡Felicidades! Has recibido una Beca en {{{academy}}}",
        "<html><body>\
         <h2>¡Hola, {{name}}!</h2>\
         <p>Nos complace informarte que se te ha otorgado una beca en {{academy}}.</p>\
         <ul><li><strong>Porcentaje de Beca:</strong> {{percentage}}%</li>\
         <li><strong>Tu nueva mensualidad es de:</strong> {{fee}}</li>\
         <li><strong>Tu próxima fecha de pago es:</strong> {{next}}</li></ul>\
         <p>¡Sigue esforzándote!</p>\
         {{> signature}}\
         </body></html>",
    ),
    (
        "account_status_changed",
        "Tu cuenta de {{{academy}}} {{#if activated}}ha sido activada{{else}}ha sido desactivada{{/if}}",
        "<html><body>\
         <h2>¡Hola, {{name}}!</h2>\
         {{#if activated}}\
         <p>Nos complace informarte que tu acceso a la plataforma ha sido restaurado. \
         ¡Ya puedes ingresar!</p>\
         {{else}}\
         <p>Te informamos que tu acceso a la plataforma ha sido desactivado por un \
         administrador. Si crees que es un error, por favor comunícate con nosotros.</p>\
         {{/if}}\
         {{> signature}}\
         </body></html>",
    ),
    (
        "platforms_assigned",
        "Bienvenido a {{{academy}}} - Tus Plataformas de Estudio",
        "<html><body>\
         <h2>¡Bienvenido, {{name}}!</h2>\
         <p>Gracias por matricularte con nosotros. Tienes acceso a las siguientes plataformas de estudio:</p>\
         <ul>{{#each platforms}}<li><strong>{{name}}:</strong> <a href=\"{{url}}\">Acceder aquí</a></li>{{/each}}</ul>\
         <p>Usa tu correo como usuario y contraseña para acceder a las cuentas. \
         No olvides cambiar tu contraseña en Flyfar.</p>\
         {{> signature}}\
         </body></html>",
    ),
    (
        "account_deactivated",
        "Notificación: Acceso a la plataforma deshabilitado - {{{academy}}}",
        "<html><body>\
         <h2>Hola, {{name}}</h2>\
         <p>Te informamos que el acceso a tu cuenta ha sido deshabilitado debido a un pago pendiente.</p>\
         <ul><li><strong>Monto pendiente:</strong> {{amount}}</li></ul>\
         <p>Para reactivar tu acceso, por favor realiza el pago correspondiente y comunícate \
         con nosotros al <strong>{{phone}}</strong> para confirmar la operación.</p>\
         <p>Agradecemos tu comprensión.</p>\
         {{> signature}}\
         </body></html>",
    ),
];

/// A rendered email, ready for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Registered templates plus the academy details that appear in every message.
#[derive(Clone)]
pub struct Formatter {
    registry: Arc<Handlebars<'static>>,
    academy_name: String,
    contact_phone: String,
}

impl Formatter {
    /// Register every template. Fails only if a template does not parse.
    pub fn new(
        academy_name: impl Into<String>,
        contact_phone: impl Into<String>,
    ) -> AcademyResult<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);

        registry
            .register_partial("signature", SIGNATURE)
            .map_err(|e| AcademyError::ConfigError(format!("signature template: {e}")))?;

        for (name, subject, body) in TEMPLATES {
            registry
                .register_template_string(&format!("{name}.subject"), subject)
                .map_err(|e| AcademyError::ConfigError(format!("{name} subject template: {e}")))?;
            registry
                .register_template_string(&format!("{name}.body"), body)
                .map_err(|e| AcademyError::ConfigError(format!("{name} body template: {e}")))?;
        }

        Ok(Self {
            registry: Arc::new(registry),
            academy_name: academy_name.into(),
            contact_phone: contact_phone.into(),
        })
    }

    pub fn academy_name(&self) -> &str {
        &self.academy_name
    }

    pub fn format(&self, notification: &Notification) -> RenderedEmail {
        let (template, context) = match notification {
            Notification::PaymentConfirmed(p) => ("payment_confirmed", self.payment_confirmed(p)),
            Notification::PaymentReminder(p) => ("payment_reminder", self.payment_reminder(p)),
            Notification::ScholarshipGranted(p) => {
                ("scholarship_granted", self.scholarship_granted(p))
            }
            Notification::AccountStatusChanged(p) => {
                ("account_status_changed", self.account_status_changed(p))
            }
            Notification::PlatformsAssigned(p) => {
                ("platforms_assigned", self.platforms_assigned(p))
            }
            Notification::AccountDeactivated(p) => {
                ("account_deactivated", self.account_deactivated(p))
            }
        };

        RenderedEmail {
            subject: self.render(&format!("{template}.subject"), &context),
            html: self.render(&format!("{template}.body"), &context),
        }
    }

    // Every context carries every key its templates reference, so strict-mode
    // rendering of the built-in templates cannot fail.
    fn render(&self, name: &str, context: &Value) -> String {
        self.registry.render(name, context).unwrap_or_else(|e| {
            error!(template = name, error = %e, "Template rendering failed");
            String::new()
        })
    }

    fn payment_confirmed(&self, p: &PaymentConfirmed) -> Value {
        let balance = match p.payment_deadline {
            Some(deadline) if p.amount_due > 0.0 => json!({
                "amount": money(p.amount_due),
                "deadline": date(deadline),
            }),
            _ => Value::Null,
        };

        json!({
            "academy": self.academy_name,
            "name": p.recipient.student_name,
            "amount": money(p.payment_amount),
            "paid_on": date(p.payment_date),
            "balance": balance,
        })
    }

    fn payment_reminder(&self, p: &PaymentReminder) -> Value {
        json!({
            "academy": self.academy_name,
            "name": p.recipient.student_name,
            "amount": money(p.amount_due),
            "due": date(p.due_date),
        })
    }

    fn scholarship_granted(&self, p: &ScholarshipGranted) -> Value {
        json!({
            "academy": self.academy_name,
            "name": p.recipient.student_name,
            "percentage": p.percentage,
            "fee": money(p.new_monthly_fee),
            "next": date(p.next_payment_date),
        })
    }

    fn account_status_changed(&self, p: &AccountStatusChanged) -> Value {
        json!({
            "academy": self.academy_name,
            "name": p.recipient.student_name,
            "activated": matches!(p.status, StatusChange::Activated),
        })
    }

    fn platforms_assigned(&self, p: &PlatformsAssigned) -> Value {
        let platforms: Vec<Value> = p
            .platforms
            .iter()
            .map(|platform| json!({ "name": platform.name, "url": platform.url }))
            .collect();

        json!({
            "academy": self.academy_name,
            "name": p.recipient.student_name,
            "platforms": platforms,
        })
    }

    fn account_deactivated(&self, p: &AccountDeactivated) -> Value {
        json!({
            "academy": self.academy_name,
            "name": p.recipient.student_name,
            "amount": money(p.amount_due),
            "phone": self.contact_phone,
        })
    }
}

impl std::fmt::Debug for Formatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Formatter")
            .field("academy_name", &self.academy_name)
            .field("contact_phone", &self.contact_phone)
            .finish_non_exhaustive()
    }
}

fn money(amount: f64) -> String {
    format!("S/ {amount:.2}")
}

fn date(day: NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}
