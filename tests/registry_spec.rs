use feature_registry::config::Settings;
use feature_registry::error::ConfigurationError;
use feature_registry::models::*;
use feature_registry::registry::*;
use feature_registry::sample;
use feature_registry::workspace::workspace_document;
use speculate2::speculate;

fn titles<'a>(registry: &'a Registry, model_uid: &str) -> Vec<&'a str> {
    let options = registry.get_model_by_uid(model_uid).expect("model registered");
    registry.links_of(options).map(|l| l.title()).collect()
}

fn register(class: FeatureClass) -> Result<(), ConfigurationError> {
    let symbols = sample::symbols()
        .form("tests.forms.Plain", FormDescriptor::plain())
        .manipulator("tests.manipulators.Undeclared", ManipulatorDescriptor::undeclared());
    RegistryBuilder::new(symbols).register(class).map(|_| ())
}

fn mpa_like(name: &str) -> FeatureClass {
    FeatureClass::feature("tests", name)
        .geometry(GeometryType::Polygon)
        .options(OptionsSpec::new("marine.forms.MpaForm"))
}

fn with_options(name: &str, options: OptionsSpec) -> FeatureClass {
    FeatureClass::feature("tests", name)
        .geometry(GeometryType::Polygon)
        .options(options)
}

/// Registry with one extra collection declaring `children`.
fn with_collection(children: Option<Vec<&str>>) -> Registry {
    let mut options = OptionsSpec::new("marine.forms.FolderForm");
    if let Some(children) = children {
        options = options.valid_children(children);
    }
    RegistryBuilder::new(sample::symbols())
        .register_all(sample::classes())
        .and_then(|b| b.register_all([FeatureClass::collection("tests", "Bin").options(options)]))
        .and_then(RegistryBuilder::build)
        .expect("registry builds")
}

speculate! {
    before {
        let registry = sample::registry("/features").expect("sample registry builds");
    }

    describe "feature options" {
        it "derives slug and verbose name from the class" {
            let mpa = registry.get_model_options("Mpa").unwrap();
            assert_eq!(mpa.slug(), "mpa");
            assert_eq!(mpa.model_uid(), "marine_mpa");
            assert_eq!(mpa.verbose_name(), "Marine Protected Area");

            let pipeline = registry.get_model_options("Pipeline").unwrap();
            assert_eq!(pipeline.verbose_name(), "Pipeline");
            assert_eq!(pipeline.form_template(), DEFAULT_FORM_TEMPLATE);
        }

        it "orders default links around the explicit ones" {
            assert_eq!(
                titles(&registry, "marine_mpa"),
                vec!["KMZ", "KML", "GeoJSON", "PNG Image", "Delete", "Summary", "Habitat Report", "Copy"]
            );
        }

        it "omits defaults that are switched off" {
            assert_eq!(titles(&registry, "marine_pipeline"), vec!["GeoJSON", "Delete", "Copy"]);
            assert_eq!(
                titles(&registry, "marine_folder"),
                vec!["KMZ", "KML", "GeoJSON", "PNG Image", "Delete"]
            );
        }

        it "resolves instance URLs through the route table" {
            let mpa = registry.get_model_options("Mpa").unwrap();
            let routes = registry.routes();
            assert_eq!(mpa.get_create_form(routes).unwrap(), "/features/mpa/form/");
            assert_eq!(mpa.get_resource(routes, 7).unwrap(), "/features/mpa/marine_mpa_7/");
            assert_eq!(mpa.get_update_form(routes, 7).unwrap(), "/features/mpa/marine_mpa_7/form/");
            assert_eq!(mpa.get_share_form(routes, 7).unwrap(), "/features/mpa/marine_mpa_7/share/");
        }

        it "falls back to the stub show template when the declared one is missing" {
            let mpa = registry.get_model_options("Mpa").unwrap();
            let empty = feature_registry::templates::TemplateSet::new();
            let present = feature_registry::templates::TemplateSet::new().with("mpa/show.html");
            assert_eq!(mpa.show_template(&empty), STUB_SHOW_TEMPLATE);
            assert_eq!(mpa.show_template(&present), "mpa/show.html");
        }
    }

    describe "generic links" {
        it "merges identical declarations from several classes" {
            let summary = registry.get_link("marine_shipwreck", "Summary").unwrap();
            assert!(summary.is_generic());
            assert_eq!(summary.models().len(), 2);
            assert_eq!(
                registry.routes().template("generic-links-summary"),
                Some("/features/generic-links/links/summary/{uids}/")
            );
        }

        it "keeps links declared once on their class" {
            let report = registry.get_link("marine_mpa", "Habitat Report").unwrap();
            assert!(!report.is_generic());
            assert_eq!(report.url_name(), "mpa-habitat-report");
            assert!(registry.link_by_route("mpa", "habitat-report").is_some());
        }

        it "does not merge links that differ in extra arguments" {
            let wgs84 = registry.get_link("marine_shipwreck", "GeoJSON (WGS84)").unwrap();
            assert!(!wgs84.is_generic());
            assert_eq!(wgs84.extra_args().srid, Some(4326));
            assert_eq!(wgs84.url_name(), "shipwreck-geojson-wgs84");
        }

        it "lists every link once" {
            let deletes = registry.links().iter().filter(|l| l.title() == "Delete").count();
            assert_eq!(deletes, 1);
            let delete = registry.get_link("marine_folder", "Delete").unwrap();
            assert_eq!(delete.models().len(), 5);
            assert!(delete.must_own());
            assert_eq!(delete.method(), "DELETE");
        }

        it "reports missing links by model and title" {
            let err = registry.get_link("marine_pipeline", "KML").unwrap_err();
            assert_eq!(err.to_string(), "Pipeline has no link named KML");
        }
    }

    describe "link validation" {
        it "explains unresolvable views from a known module" {
            let err = register(with_options(
                "Broken",
                OptionsSpec::new("marine.forms.MpaForm").link(related("Export", "marine.views.export")),
            ))
            .unwrap_err();
            match err {
                ConfigurationError::UnresolvedView { view, hint, .. } => {
                    assert_eq!(view, "marine.views.export");
                    assert!(hint.is_some());
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        it "rejects unknown select options" {
            let err = register(with_options(
                "Broken",
                OptionsSpec::new("marine.forms.MpaForm")
                    .link(related("Summary", sample::SUMMARY_VIEW).select("all")),
            ))
            .unwrap_err();
            assert_eq!(err, ConfigurationError::InvalidSelect("all".to_string()));
        }

        it "rejects views whose signature does not match the select option" {
            let err = register(with_options(
                "Broken",
                OptionsSpec::new("marine.forms.MpaForm")
                    .link(alternate("Report", sample::REPORT_VIEW).select("multiple")),
            ))
            .unwrap_err();
            assert_eq!(
                err,
                ConfigurationError::InvalidViewSignature {
                    title: "Report".to_string(),
                    expected: "instances",
                }
            );
        }

        it "rejects empty titles" {
            let err = register(with_options(
                "Broken",
                OptionsSpec::new("marine.forms.MpaForm").link(alternate("", sample::REPORT_VIEW)),
            ))
            .unwrap_err();
            assert_eq!(err, ConfigurationError::EmptyLinkTitle);
        }
    }

    describe "registration errors" {
        it "requires a feature class" {
            let err = register(FeatureClass::plain("tests", "Lookup")).unwrap_err();
            assert_eq!(err, ConfigurationError::NotAFeature { model: "Lookup".to_string() });
        }

        it "requires options" {
            let err = register(FeatureClass::feature("tests", "Bare")).unwrap_err();
            assert_eq!(err, ConfigurationError::MissingOptions { model: "Bare".to_string() });
        }

        it "requires a form" {
            let err = register(with_options("Formless", OptionsSpec::default())).unwrap_err();
            assert_eq!(err, ConfigurationError::MissingForm { model: "Formless".to_string() });
        }

        it "requires the form to resolve to a feature form" {
            let err = register(with_options("Odd", OptionsSpec::new("tests.forms.Missing"))).unwrap_err();
            assert!(matches!(err, ConfigurationError::UnresolvedForm { .. }));

            let err = register(with_options("Odd", OptionsSpec::new("tests.forms.Plain"))).unwrap_err();
            assert_eq!(
                err,
                ConfigurationError::NotAFeatureForm {
                    model: "Odd".to_string(),
                    form: "tests.forms.Plain".to_string(),
                }
            );
        }

        it "only lets collections declare children" {
            let err = register(with_options(
                "Parent",
                OptionsSpec::new("marine.forms.MpaForm").valid_children(["marine.Mpa"]),
            ))
            .unwrap_err();
            assert_eq!(err, ConfigurationError::ChildrenOnNonCollection { model: "Parent".to_string() });
        }

        it "accepts registration of a well formed class" {
            assert!(register(mpa_like("Reserve")).is_ok());
        }
    }

    describe "manipulators" {
        it "must resolve" {
            let err = register(with_options(
                "Clipped",
                OptionsSpec::new("marine.forms.MpaForm").manipulator("tests.manipulators.Missing"),
            ))
            .unwrap_err();
            assert!(matches!(err, ConfigurationError::UnresolvedManipulator { .. }));
        }

        it "must declare the geometries they support" {
            let err = register(with_options(
                "Clipped",
                OptionsSpec::new("marine.forms.MpaForm")
                    .optional_manipulator("tests.manipulators.Undeclared"),
            ))
            .unwrap_err();
            assert!(matches!(err, ConfigurationError::ManipulatorWithoutGeometries { .. }));
        }

        it "need a geometry field on the class" {
            let class = FeatureClass::feature("tests", "Flat").options(
                OptionsSpec::new("marine.forms.MpaForm").manipulator(sample::CLIP_TO_GRATICULE),
            );
            let err = register(class).unwrap_err();
            assert!(matches!(err, ConfigurationError::NoGeometryField { .. }));
        }

        it "must support the class geometry type" {
            let class = FeatureClass::feature("tests", "Cable")
                .geometry(GeometryType::LineString)
                .options(OptionsSpec::new("marine.forms.PipelineForm").manipulator(sample::CLIP_TO_GRATICULE));
            let err = register(class).unwrap_err();
            assert_eq!(
                err,
                ConfigurationError::UnsupportedGeometry {
                    manipulator: sample::CLIP_TO_GRATICULE.to_string(),
                    field: "LineStringField".to_string(),
                    supported: "PolygonField, MultiPolygonField".to_string(),
                }
            );
        }
    }

    describe "hierarchy" {
        it "lists collections and plain features apart" {
            let collections: Vec<&str> = registry
                .get_collection_models()
                .iter()
                .map(|o| o.model_uid())
                .collect();
            assert_eq!(collections, vec!["marine_array", "marine_folder"]);
            assert_eq!(registry.get_feature_models().len(), 3);
        }

        it "finds every potential parent once" {
            let mpa = registry.get_model_options("Mpa").unwrap();
            let parents: Vec<&str> = registry
                .get_potential_parents(mpa)
                .iter()
                .map(|o| o.model_uid())
                .collect();
            assert_eq!(parents, vec!["marine_array", "marine_folder"]);
        }

        it "makes a self-containing collection its own parent" {
            let folder = registry.get_model_options("Folder").unwrap();
            let parents: Vec<&str> = registry
                .get_potential_parents(folder)
                .iter()
                .map(|o| o.model_uid())
                .collect();
            assert_eq!(parents, vec!["marine_folder"]);
        }

        it "roots the containment tree at top-level collections" {
            let tree = registry.containment_tree();
            assert_eq!(tree.len(), 1);
            assert_eq!(tree[0].model_uid, "marine_folder");
            let children: Vec<&str> = tree[0].children.iter().map(|c| c.model_uid.as_str()).collect();
            assert_eq!(children, vec!["marine_mpa", "marine_array", "marine_pipeline", "marine_shipwreck"]);
            assert_eq!(tree[0].children[1].children[0].model_uid, "marine_mpa");
        }

        it "fails on collections without children" {
            let registry = with_collection(None);
            let bin = registry.get_model_options("Bin").unwrap();
            assert_eq!(
                registry.get_valid_children(bin).unwrap_err(),
                ConfigurationError::NotACollection { model: "Bin".to_string() }
            );
            assert!(!registry.is_collection_model("tests_bin"));
            assert!(registry.routes().template("bin_add_features").is_none());
        }

        it "fails on children that do not resolve" {
            let registry = with_collection(Some(vec!["marine.Kelp"]));
            let bin = registry.get_model_options("Bin").unwrap();
            assert_eq!(
                registry.get_valid_children(bin).unwrap_err(),
                ConfigurationError::UnresolvedChild { child: "marine.Kelp".to_string() }
            );
        }

        it "fails on children that are not features" {
            let registry = with_collection(Some(vec!["marine.Mpa", "auth.Group"]));
            let bin = registry.get_model_options("Bin").unwrap();
            assert_eq!(
                registry.get_valid_children(bin).unwrap_err(),
                ConfigurationError::ChildNotAFeature { child: "auth.Group".to_string() }
            );
        }

        it "terminates on containment cycles" {
            let symbols = SymbolTable::with_builtin_views()
                .form("tests.forms.Form", FormDescriptor::feature_form());
            let registry = RegistryBuilder::new(symbols)
                .register_all([
                    FeatureClass::collection("tests", "Left")
                        .options(OptionsSpec::new("tests.forms.Form").valid_children(["tests.Right"])),
                    FeatureClass::collection("tests", "Right")
                        .options(OptionsSpec::new("tests.forms.Form").valid_children(["tests.Left"])),
                ])
                .and_then(RegistryBuilder::build)
                .unwrap();

            let left = registry.get_model_options("Left").unwrap();
            let parents: Vec<&str> = registry
                .get_potential_parents(left)
                .iter()
                .map(|o| o.model_uid())
                .collect();
            assert_eq!(parents, vec!["tests_right", "tests_left"]);
            assert!(registry.containment_tree().is_empty());
        }
    }

    describe "workspace" {
        it "hides edit links and templates from anonymous users" {
            let doc = workspace_document(&registry, &Settings::new(), &User::anonymous(), false, None).unwrap();

            let mpa = &doc.feature_classes[0];
            assert_eq!(mpa.id, "marine_mpa");
            assert_eq!(mpa.link_relations.self_link.uri_template, "/features/mpa/{uid}/");
            assert_eq!(mpa.link_relations.self_link.title.as_deref(), Some("View"));
            assert!(mpa.link_relations.create.is_none());
            assert!(!mpa.link_relations.rels.contains_key("edit"));

            let generic: Vec<&str> = doc
                .generic_links
                .iter()
                .filter_map(|l| l.title.as_deref())
                .collect();
            assert_eq!(generic, vec!["Summary", "PNG Image", "GeoJSON", "KML", "KMZ"]);
        }

        it "gives owners create, edit and share templates" {
            let owner = User {
                id: 1,
                username: "alice".to_string(),
                is_staff: false,
                groups: vec![],
            };
            let doc = workspace_document(&registry, &Settings::new(), &owner, true, None).unwrap();
            let mpa = &doc.feature_classes[0];

            assert_eq!(
                mpa.link_relations.create.as_ref().map(|l| l.uri_template.as_str()),
                Some("/features/mpa/form/")
            );
            let edit: Vec<&str> = mpa.link_relations.rels["edit"]
                .iter()
                .filter_map(|l| l.title.as_deref())
                .collect();
            assert_eq!(edit, vec!["Edit", "Share"]);
            assert!(!mpa.link_relations.rels.contains_key("alternate"));

            let generic: Vec<&str> = doc
                .generic_links
                .iter()
                .filter_map(|l| l.title.as_deref())
                .collect();
            assert!(generic.contains(&"Delete"));
            assert!(generic.contains(&"Copy"));
        }

        it "shows group-limited links to members only" {
            let analyst = User {
                id: 2,
                username: "bob".to_string(),
                is_staff: false,
                groups: vec![sample::ANALYSTS_GROUP.to_string()],
            };
            let doc = workspace_document(&registry, &Settings::new(), &analyst, true, Some(&["marine_mpa"])).unwrap();
            let alternate = &doc.feature_classes[0].link_relations.rels["alternate"];
            assert_eq!(alternate[0].title.as_deref(), Some("Habitat Report"));
            assert_eq!(alternate[0].uri_template, "/features/mpa/links/habitat-report/{uid+}/");
        }

        it "describes collections to their owners" {
            let owner = User {
                id: 1,
                username: "alice".to_string(),
                is_staff: false,
                groups: vec![],
            };
            let doc = workspace_document(&registry, &Settings::new(), &owner, true, Some(&["marine_folder"])).unwrap();
            let collection = doc.feature_classes[0].collection.as_ref().unwrap();
            assert_eq!(collection.classes.len(), 5);
            assert_eq!(collection.add.uri_template, "/features/folder/{collection_uid}/add/{uid+}");
            assert_eq!(collection.remove.uri_template, "/features/folder/{collection_uid}/remove/{uid+}");
        }

        it "limits generic links to the requested models" {
            let doc = workspace_document(
                &registry,
                &Settings::new(),
                &User::anonymous(),
                false,
                Some(&["marine_pipeline"]),
            )
            .unwrap();
            assert_eq!(doc.feature_classes.len(), 1);
            let generic: Vec<&str> = doc
                .generic_links
                .iter()
                .filter_map(|l| l.title.as_deref())
                .collect();
            assert_eq!(generic, vec!["GeoJSON"]);
        }

        it "rejects unknown models" {
            assert!(workspace_document(&registry, &Settings::new(), &User::anonymous(), false, Some(&["marine_kelp"])).is_err());
        }
    }
}
