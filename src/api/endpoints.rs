//! Dashboard API endpoint paths, relative to the configured base URL.

// Products
pub const PRODUCTS: &str = "/products";
pub const LOW_STOCK_PRODUCTS: &str = "/products/low-stock";
pub const SEARCH_PRODUCTS: &str = "/products/search";

pub fn product_by_id(id: &str) -> String {
  format!("/products/{}", id)
}

pub fn restock_product(id: &str) -> String {
  format!("/products/{}/restock", id)
}

pub fn product_image(id: &str) -> String {
  format!("/products/{}/image", id)
}

// Orders and sales
pub const ORDERS: &str = "/orders";
pub const MANUAL_SALE: &str = "/sales/manual";

pub fn order_by_id(id: &str) -> String {
  format!("/orders/{}", id)
}

pub fn order_status(id: &str) -> String {
  format!("/orders/{}/status", id)
}

// Users
pub const USERS: &str = "/users";

pub fn user_by_id(id: &str) -> String {
  format!("/users/{}", id)
}

// Dashboard
pub const DASHBOARD_SUMMARY: &str = "/dashboard/summary";

// Delivery
pub const DELIVERY_ZONES: &str = "/delivery/zones";
pub const DELIVERY_ESTIMATE: &str = "/delivery/estimate";
pub const CREATE_SHIPMENT: &str = "/delivery/create";

pub fn track_shipment(tracking_id: &str) -> String {
  format!("/delivery/track/{}", tracking_id)
}

pub fn update_shipment(tracking_id: &str) -> String {
  format!("/delivery/track/{}/update", tracking_id)
}

// Expenses
pub const LOG_EXPENSE: &str = "/expenses/log";
pub const EXPENSE_SUMMARY: &str = "/expenses/summary";
pub const LIST_EXPENSES: &str = "/expenses/list";

// Profit & loss
pub const PROFIT_TODAY: &str = "/profit-loss/today";
pub const PROFIT_SUMMARY: &str = "/profit-loss/summary";
pub const PROFIT_REPORT: &str = "/profit-loss/report";
pub const PROFIT_WEEK: &str = "/profit-loss/week";
pub const PROFIT_MONTH: &str = "/profit-loss/month";
pub const PROFIT_CHANNELS: &str = "/profit-loss/channels";

pub const ANALYTICS: &str = "/analytics";

// Bot and vendor settings
pub const BOT_STYLE: &str = "/settings/bot-style";
pub const BOT_PAUSE: &str = "/bot/pause";
pub const BOT_STATUS: &str = "/bot/status";
pub const VENDOR_SETTINGS: &str = "/vendor/settings";
pub const VENDOR_PAYMENT_ACCOUNT: &str = "/vendor/payment-account";
pub const VENDOR_BUSINESS_INFO: &str = "/vendor/business-info";
pub const DEVICE_TOKENS: &str = "/device-tokens";

// Subscription and usage
pub const SUBSCRIPTION_PLANS: &str = "/subscription/plans";
pub const PURCHASE_SUBSCRIPTION: &str = "/subscription/purchase";
pub const SUBSCRIPTION_UPGRADE: &str = "/subscription/upgrade";
pub const USAGE_STATS: &str = "/usage";

// Receipts and invoices
pub const GENERATE_RECEIPT: &str = "/receipts/generate";
pub const GENERATE_INVOICE: &str = "/invoices/generate";
pub const LIST_INVOICES: &str = "/invoices";

pub fn invoice_by_id(id: &str) -> String {
  format!("/invoices/{}", id)
}

pub fn mark_invoice_paid(id: &str) -> String {
  format!("/invoices/{}/mark-paid", id)
}

pub const CHANNELS_SUMMARY: &str = "/channels/summary";

// Support
pub const SUBMIT_SUPPORT_TICKET: &str = "/support/ticket";
pub const TROUBLESHOOTING_GUIDES: &str = "/support/troubleshooting";
pub const FAQ: &str = "/support/faq";

pub const BUSINESS_AI: &str = "/business-ai";

pub const HEALTH: &str = "/health";

/// Resolve a short name (as typed on the command line) to an endpoint path.
///
/// Anything starting with `/` is taken as a path already.
pub fn resolve(name: &str) -> Option<String> {
  if name.starts_with('/') {
    return Some(name.to_string());
  }

  let path = match name {
    "products" => PRODUCTS,
    "low-stock" => LOW_STOCK_PRODUCTS,
    "orders" => ORDERS,
    "users" => USERS,
    "dashboard" => DASHBOARD_SUMMARY,
    "zones" => DELIVERY_ZONES,
    "expenses" => LIST_EXPENSES,
    "profit" | "profit_summary" => PROFIT_SUMMARY,
    "analytics" => ANALYTICS,
    "bot" => BOT_STATUS,
    "settings" => VENDOR_SETTINGS,
    "plans" => SUBSCRIPTION_PLANS,
    "usage" => USAGE_STATS,
    "invoices" => LIST_INVOICES,
    "channels" => CHANNELS_SUMMARY,
    "faq" => FAQ,
    "health" => HEALTH,
    _ => return None,
  };
  Some(path.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parameterized_paths() {
    assert_eq!(product_by_id("7"), "/products/7");
    assert_eq!(restock_product("7"), "/products/7/restock");
    assert_eq!(track_shipment("TRK1"), "/delivery/track/TRK1");
    assert_eq!(mark_invoice_paid("inv-2"), "/invoices/inv-2/mark-paid");
  }

  #[test]
  fn test_resolve() {
    assert_eq!(resolve("dashboard").as_deref(), Some("/dashboard/summary"));
    assert_eq!(resolve("/custom/path").as_deref(), Some("/custom/path"));
    assert_eq!(resolve("nope"), None);
  }
}
