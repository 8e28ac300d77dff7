//! Human-readable messages for [`MarketError`]
//!
//! Errors carry a stable code plus named parameters; a catalog maps the
//! code to a template such as `"retry in {seconds} seconds"`. Unknown codes
//! fall back to the error's `Display` text.

use serde::{Deserialize, Serialize};

use crate::error::MarketError;

/// Message catalog
pub trait MessageCatalog: Send + Sync {
    /// Template for a message code
    fn template(&self, code: &str) -> Option<&'static str>;

    /// Render an error for display to the caller
    fn render(&self, err: &MarketError) -> String {
        match self.template(err.code()) {
            Some(template) => fill(template, &err.params()),
            None => err.to_string(),
        }
    }
}

/// Supported locales
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English
    #[default]
    En,
    /// Spanish
    Es,
}

impl Locale {
    /// Catalog for this locale
    pub fn catalog(self) -> Box<dyn MessageCatalog> {
        match self {
            Self::En => Box::new(EnglishCatalog),
            Self::Es => Box::new(SpanishCatalog),
        }
    }
}

/// English messages
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishCatalog;

impl MessageCatalog for EnglishCatalog {
    fn template(&self, code: &str) -> Option<&'static str> {
        Some(match code {
            "validation.invalid" => "Invalid request: {detail}",
            "entity.not_found" => "The requested {entity} does not exist",
            "access.denied" => "You do not have access to this resource",
            "subscription.upgrade_required" => {
                "The free plan does not allow sales. Upgrade to premium to start selling."
            }
            "subscription.renew" => "Your subscription has expired. Renew your plan to keep operating.",
            "subscription.suspended" => "Your account is suspended. Contact the administrator to reactivate it.",
            "subscription.free_plan_limit" => {
                "Limit reached: the free plan allows up to {limit} products. Upgrade for unlimited products."
            }
            "stock.insufficient" => "Not enough stock for {listing}: {available} left, {requested} requested",
            "stock.overflow" => "Stock for {listing} cannot grow by {adding} more units",
            "order.illegal_transition" => "An order cannot move from {from} to {to}",
            "listing.duplicate_sku" => "SKU {sku} is already used in your store",
            "catalog.conflict" => "Product {sku} is being registered by someone else, try again",
            "payment.not_pending" => "This payment was already processed ({status})",
            "platform.maintenance" => "The marketplace is under maintenance. Please try again later.",
            "auth.rate_limited" => "Too many failed attempts. Try again in {seconds} seconds.",
            "auth.failed" => "Invalid username or password",
            _ => return None,
        })
    }
}

/// Spanish messages
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanishCatalog;

impl MessageCatalog for SpanishCatalog {
    fn template(&self, code: &str) -> Option<&'static str> {
        Some(match code {
            "validation.invalid" => "Solicitud inválida: {detail}",
            "entity.not_found" => "El recurso solicitado ({entity}) no existe",
            "access.denied" => "No tienes acceso a este recurso",
            "subscription.upgrade_required" => {
                "El plan GRATUITO no permite registrar ventas. Mejora a PREMIUM para acceder al sistema de ventas."
            }
            "subscription.renew" => "Tu suscripción ha vencido. Renueva tu plan para seguir operando.",
            "subscription.suspended" => "Tu cuenta está suspendida. Contacta al administrador para reactivarla.",
            "subscription.free_plan_limit" => {
                "Límite alcanzado: El plan GRATUITO solo permite hasta {limit} productos. ¡Mejora a PREMIUM para productos ilimitados!"
            }
            "stock.insufficient" => "Stock insuficiente para {listing}: quedan {available}, se pidieron {requested}",
            "stock.overflow" => "El stock de {listing} no puede aumentar en {adding} unidades más",
            "order.illegal_transition" => "Un pedido no puede pasar de {from} a {to}",
            "listing.duplicate_sku" => "El SKU {sku} ya existe en tu tienda",
            "catalog.conflict" => "El producto {sku} se está registrando en este momento, intenta de nuevo",
            "payment.not_pending" => "Este pago ya fue procesado ({status})",
            "platform.maintenance" => "El marketplace está en mantenimiento. Intenta más tarde.",
            "auth.rate_limited" => "Demasiados intentos fallidos. Intenta de nuevo en {seconds} segundos.",
            "auth.failed" => "Usuario o contraseña inválidos",
            _ => return None,
        })
    }
}

fn fill(template: &str, params: &[(&'static str, String)]) -> String {
    params.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}
