use resolvit::{ClassBuilder, ContainerBuilder, DiError, Lifetime, Resolver};
use std::sync::Arc;

trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;
}

struct EmailNotifier;
impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        "email"
    }
}

struct SmsNotifier;
impl Notifier for SmsNotifier {
    fn channel(&self) -> &'static str {
        "sms"
    }
}

#[derive(Default)]
struct SalesReport;

#[derive(Default)]
struct UsageReport;

#[test]
fn tagged_resolves_in_registration_order() {
    let mut builder = ContainerBuilder::new();
    builder.class(ClassBuilder::<SalesReport>::with_default("SalesReport"));
    builder.class(ClassBuilder::<UsageReport>::with_default("UsageReport"));
    builder.bind("UsageReport", "UsageReport").tag("reports");
    builder.singleton("SalesReport", "SalesReport").tags(["reports", "finance"]);
    let container = builder.build();

    let reports = container.tagged("reports").unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports[0].clone().downcast::<UsageReport>().is_ok());
    assert!(reports[1].clone().downcast::<SalesReport>().is_ok());

    assert_eq!(container.tagged("finance").unwrap().len(), 1);
    assert!(container.tagged("unknown").unwrap().is_empty());
}

#[test]
fn tagged_propagates_resolution_errors() {
    let mut builder = ContainerBuilder::new();
    builder.bind("Broken", "Missing").tag("jobs");
    let container = builder.build();
    assert!(matches!(container.tagged("jobs"), Err(DiError::Reflection { .. })));
}

#[test]
fn aliases_share_the_target_instance() {
    let mut builder = ContainerBuilder::new();
    builder.class(ClassBuilder::<SalesReport>::with_default("SalesReport"));
    builder.singleton("SalesReport", "SalesReport");
    builder.alias("sales", "SalesReport").unwrap();
    builder.alias("report.sales", "sales").unwrap();
    let container = builder.build();

    let a = container.get("SalesReport").unwrap();
    let b = container.get("sales").unwrap();
    let c = container.get("report.sales").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
    assert!(container.has("report.sales"));
}

#[test]
fn instances_registered_through_an_alias_land_on_the_target() {
    let mut builder = ContainerBuilder::new();
    builder.alias("db", "Database").unwrap();
    builder.instance("db", Arc::new("sqlite".to_string()));
    let container = builder.build();

    assert_eq!(*container.get_as::<String>("Database").unwrap(), "sqlite");

    container.instance("db", Arc::new("postgres".to_string()));
    assert_eq!(*container.get_as::<String>("Database").unwrap(), "postgres");
}

#[test]
fn alias_to_an_unbound_class_autowires_the_class() {
    let mut builder = ContainerBuilder::new();
    builder.class(ClassBuilder::<UsageReport>::with_default("UsageReport"));
    builder.alias("usage", "UsageReport").unwrap();
    let container = builder.build();

    assert!(container.get_as::<UsageReport>("usage").is_ok());
    assert_eq!(container.inspect("usage").resolved_id, "UsageReport");
}

#[test]
fn trait_objects_through_factories_and_instances() {
    let mut builder = ContainerBuilder::new();
    builder.singleton_trait_factory::<dyn Notifier, _>("Notifier", |_| Ok(Arc::new(EmailNotifier)));
    builder.trait_factory::<dyn Notifier, _>("Fallback", Lifetime::Transient, |_| Ok(Arc::new(SmsNotifier)));
    builder.instance_trait::<dyn Notifier>("Pager", Arc::new(SmsNotifier));
    let container = builder.build();

    let primary = container.get_trait::<dyn Notifier>("Notifier").unwrap();
    assert_eq!(primary.channel(), "email");
    let again = container.get_trait::<dyn Notifier>("Notifier").unwrap();
    assert!(Arc::ptr_eq(&primary, &again));

    assert_eq!(container.get_trait::<dyn Notifier>("Fallback").unwrap().channel(), "sms");
    assert_eq!(container.get_trait::<dyn Notifier>("Pager").unwrap().channel(), "sms");

    container.instance_trait::<dyn Notifier>("Runtime", Arc::new(EmailNotifier));
    assert_eq!(container.get_trait::<dyn Notifier>("Runtime").unwrap().channel(), "email");
}

#[test]
fn trait_object_constructor_arguments() {
    struct Alerts {
        notifier: Arc<dyn Notifier>,
    }
    let mut builder = ContainerBuilder::new();
    builder.singleton_trait_factory::<dyn Notifier, _>("Notifier", |_| Ok(Arc::new(SmsNotifier)));
    builder.class(
        ClassBuilder::<Alerts>::new("Alerts")
            .param(resolvit::Param::service("notifier", "Notifier"))
            .constructor(|args| {
                Ok(Alerts {
                    notifier: args.service_trait::<dyn Notifier>("notifier")?,
                })
            }),
    );
    let container = builder.build();

    let alerts = container.get_as::<Alerts>("Alerts").unwrap();
    assert_eq!(alerts.notifier.channel(), "sms");
}

#[test]
fn rebinding_replaces_the_definition() {
    let mut builder = ContainerBuilder::new();
    builder.class(ClassBuilder::<SalesReport>::with_default("SalesReport"));
    builder.class(ClassBuilder::<UsageReport>::with_default("UsageReport"));
    builder.bind("Report", "SalesReport").tag("old");
    builder.singleton("Report", "UsageReport");
    let container = builder.build();

    assert!(container.get_as::<UsageReport>("Report").is_ok());
    assert_eq!(container.definitions().len(), 1);
    assert_eq!(container.definitions().get("Report").map(|d| d.lifetime), Some(Lifetime::Singleton));
    assert!(container.tagged("old").unwrap().is_empty());
}
