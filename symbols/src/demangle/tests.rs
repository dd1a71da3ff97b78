#![cfg(test)]

use crate::{
    demangle, demangle_bytes, demangle_type, mangle, mangle_bytes, print, print_with, DemangleOptions,
    Error, MAX_NODE_DEPTH, MAX_NODE_WEIGHT,
};

macro_rules! none {
    ($mangled:literal) => {
        if demangle($mangled).is_ok() {
            panic!("Demangling '{}' succeeded when it wasn't supposed to.", $mangled);
        }
    };
}

macro_rules! eq {
    ($mangled:literal => $demangled:literal) => {
        let node = demangle($mangled).expect(&format!("Demangling '{}' failed.", $mangled));
        assert_eq!(print(&node).unwrap(), $demangled);
    };
}

/// Demangles and remangles a symbol, expecting the prefix normalized to `$s`.
macro_rules! remangles {
    ($mangled:literal) => {
        let node = demangle($mangled).expect(&format!("Demangling '{}' failed.", $mangled));
        let expected = $mangled.strip_prefix('_').unwrap_or($mangled);
        let expected = match expected.strip_prefix("$S") {
            Some(rest) => format!("$s{rest}"),
            None => expected.to_string(),
        };

        assert_eq!(mangle(&node).unwrap(), expected);
    };
}

// manglings taken from swift's test/Demangle/Inputs/manglings.txt

#[test]
fn functions() {
    eq!("$s1b1CC16funcWithCallback3fooyyyXE_tF" => "b.C.funcWithCallback(foo: () -> ()) -> ()");
    eq!("$s4test3StrCACycfC" => "test.Str.__allocating_init() -> test.Str");
    eq!("_$S3abc6testityySiFTm" => "merged abc.testit(Swift.Int) -> ()");
}

#[test]
fn metadata() {
    eq!("$sBf128_N" => "type metadata for Builtin.FPIEEE128");
    eq!("_$sBf128_N" => "type metadata for Builtin.FPIEEE128");
    eq!("$SSiSHsWP" => "protocol witness table for Swift.Int : Swift.Hashable in Swift");
    eq!("$S4blah8PatatinoaySiGD" => "blah.Patatino<Swift.Int>");
}

#[test]
fn descriptors() {
    eq!(
        "$S1T19protocol_resilience17ResilientProtocolPTl"
            => "associated type descriptor for protocol_resilience.ResilientProtocol.T"
    );
    eq!(
        "$S18resilient_protocol21ResilientBaseProtocolTL"
            => "protocol requirements base descriptor for resilient_protocol.ResilientBaseProtocol"
    );
    eq!(
        "$S1t1PP10AssocType2_AA1QTn"
            => "associated conformance descriptor for t.P.AssocType2: t.Q"
    );
    eq!(
        "$S1t1PP10AssocType2_AA1QTN"
            => "default associated conformance accessor for t.P.AssocType2: t.Q"
    );
}

#[test]
fn key_paths() {
    eq!(
        "$s18keypaths_inlinable13KeypathStructV8computedSSvpACTKq"
            => "key path getter for keypaths_inlinable.KeypathStruct.computed : Swift.String : keypaths_inlinable.KeypathStruct, serialized"
    );
}

#[test]
fn assorted() {
    eq!("_$S4main4TestC1xACSi_tc6_PRIV_Llfc" => "main.Test.(in _PRIV_).init(x: Swift.Int) -> main.Test");
    eq!(
        "$s4test3fooV4blahyAA1SV1fQryFQOy_Qo_AHF"
            => "test.foo.blah(<<opaque return type of test.S.f() -> some>>.0) -> <<opaque return type of test.S.f() -> some>>.0"
    );
    eq!(
        "$S3nix8MystructV1xACyxGx_tcfc7MyaliasL_ayx__GD"
            => "Myalias #1 in nix.Mystruct<A>.init(x: A) -> nix.Mystruct<A>"
    );
    eq!("$S3nix7MyclassCfd7MyaliasL_ayx__GD" => "Myalias #1 in nix.Myclass<A>.deinit");
    eq!(
        "$S3nix8MystructVyS2icig7MyaliasL_ayx__GD"
            => "Myalias #1 in nix.Mystruct<A>.subscript.getter : (Swift.Int) -> Swift.Int"
    );
    eq!(
        "$S3nix8MystructV1x1uACyxGx_qd__tclufc7MyaliasL_ayx_qd___GD"
            => "Myalias #1 in nix.Mystruct<A>.init<A1>(x: A, u: A1) -> nix.Mystruct<A>"
    );
    eq!(
        "$S3nix8MystructV6testit1xyx_tF7MyaliasL_ayx__GD"
            => "Myalias #1 in nix.Mystruct<A>.testit(x: A) -> ()"
    );
    eq!(
        "$S3nix8MystructV6testit1x1u1vyx_qd__qd_0_tr0_lF7MyaliasL_ayx_qd__qd_0__GD"
            => "Myalias #1 in nix.Mystruct<A>.testit<A1, B1>(x: A, u: A1, v: B1) -> ()"
    );
    eq!("$S7TestMod5OuterV3Fooayx_SiGD" => "TestMod.Outer<A>.Foo<Swift.Int>");
    eq!("$Ss17_VariantSetBufferO05CocoaC0ayx_GD" => "Swift._VariantSetBuffer<A>.CocoaBuffer");
    eq!(
        "$S2t21QP22ProtocolTypeAliasThingayAA4BlahV5SomeQa_GSgD"
            => "Swift.Optional<t2.Q<t2.Blah.SomeQ>.ProtocolTypeAliasThing>"
    );
    eq!("$s1A1gyyxlFx_qd__t_Ti5" => "inlined generic function <(A, A1)> of A.g<A>(A) -> ()");
    eq!(
        "$s3red4testyAA3ResOyxSayq_GAEs5ErrorAAq_sAFHD1__HCg_GADyxq_GsAFR_r0_lF"
            => "red.test<A, B where B: Swift.Error>(red.Res<A, B>) -> red.Res<A, Swift.Array<B>>"
    );
    eq!(
        "$s3red4testyAA7OurTypeOy4them05TheirD0Vy5AssocQzGAjE0F8ProtocolAAxAA0c7DerivedH0HD1_AA0c4BaseH0HI1_AieKHA2__HCg_GxmAaLRzlF"
            => "red.test<A where A: red.OurDerivedProtocol>(A.Type) -> red.OurType<them.TheirType<A.Assoc>>"
    );
    eq!(
        "$sSo16MKCoordinateSpana6MapKitE34_conditionallyBridgeFromObjectiveC_6resultSbSo7NSValueC_ABSgztFZ"
            => "static (extension in MapKit):__C.MKCoordinateSpan._conditionallyBridgeFromObjectiveC(_: __C.NSValue, result: inout Swift.Optional<__C.MKCoordinateSpan>) -> Swift.Bool"
    );
    eq!(
        "$sSo8PHChangeC6PhotosE13changeDetails3forSo014PHObjectChangeD0CyxGSgx_tSo0F0CRbzlF"
            => "(extension in Photos):__C.PHChange.changeDetails<A where A: __C.PHObject>(for: A) -> Swift.Optional<__C.PHObjectChangeDetails<A>>"
    );
    eq!(
        "$sSo10SCNVector3V8SceneKitEyAB12CoreGraphics7CGFloatV_A2FtcfC"
            => "(extension in SceneKit):__C.SCNVector3.init(CoreGraphics.CGFloat, CoreGraphics.CGFloat, CoreGraphics.CGFloat) -> __C.SCNVector3"
    );
    eq!(
        "_$sSB18exponentBitPattern11RawExponentQzvgTj"
            => "dispatch thunk of Swift.BinaryFloatingPoint.exponentBitPattern.getter : A.RawExponent"
    );
    eq!(
        "_$sSD10startIndexSD0B0Vyxq__Gvg"
            => "Swift.Dictionary.startIndex.getter : Swift.Dictionary<A, B>.Index"
    );
    eq!(
        "$s1c1CCAA17__FirstProtocol__A2aDP7__foo__8intParam06stringE0ySi_SStFTW"
            => "protocol witness for c.__FirstProtocol__.__foo__(intParam: Swift.Int, stringParam: Swift.String) -> () in conformance c.C : c.__FirstProtocol__ in c"
    );
    eq!(
        "$sSo8NSObjectCSgIeyBa_ACIego_TR"
            => "reabstraction thunk helper from @escaping @callee_unowned @convention(block) () -> (@autoreleased Swift.Optional<__C.NSObject>) to @escaping @callee_guaranteed () -> (@owned Swift.Optional<__C.NSObject>)"
    );
}

#[test]
fn errors() {
    assert_eq!(demangle("$s9999999999test"), Err(Error::TruncatedInput));
    assert_eq!(demangle("$sAA"), Err(Error::UnknownBackReference));
    assert_eq!(demangle("$s99999999999999999999999x"), Err(Error::Overflow));
    assert_eq!(demangle("$sS!D"), Err(Error::UnknownShorthand));
    assert_eq!(demangle("$s004abc!D"), Err(Error::UnknownIdentifierEncoding));
    assert_eq!(demangle_bytes(b"$s002\xff\xfeD"), Err(Error::UnknownIdentifierEncoding));
    assert_eq!(demangle_bytes(b"$s\x03\x10\0\0\0N"), Err(Error::UnsupportedConstruct));
    assert_eq!(demangle("_TtSi"), Err(Error::UnsupportedConstruct));
    assert_eq!(demangle("_T"), Err(Error::UnsupportedConstruct));
}

#[test]
fn symbolic_references() {
    for mangled in [
        &b"$s\x01\x10\0\0\0N"[..],
        b"$s\x01\x10\0\0\0ySiGD",
        b"$s\x02\xff\xff\xff\x7fSgN",
    ] {
        let node = demangle_bytes(mangled).unwrap();
        assert_eq!(mangle_bytes(&node).unwrap(), mangled);
    }

    let node = demangle_bytes(b"$s\x01\x10\0\0\0ySiGD").unwrap();
    assert_eq!(print(&node).unwrap(), "type symbolic reference 0x10<Swift.Int>");

    // the offset isn't valid UTF-8
    let node = demangle_bytes(b"$s\x02\xff\xff\xff\x7fSgN").unwrap();
    assert_eq!(mangle(&node), Err(Error::UnsupportedConstruct));
}

fn nested_optionals(count: usize) -> String {
    format!("$sSi{}D", "Sg".repeat(count))
}

#[test]
fn nesting() {
    // every level of `Optional` adds three levels to the tree
    let worker = std::thread::Builder::new().stack_size(16 * 1024 * 1024);
    let handle = worker.spawn(|| {
        let mangled = nested_optionals(60);
        let node = demangle(&mangled).unwrap();
        assert!(node.depth() <= MAX_NODE_DEPTH);
        assert_eq!(mangle(&node).unwrap(), mangled);

        let printed = print(&node).unwrap();
        assert!(printed.starts_with("Swift.Optional<Swift.Optional<"));
        assert_eq!(node.to_string(), printed);
    });
    handle.unwrap().join().unwrap();

    assert_eq!(demangle(&nested_optionals(64)), Err(Error::TooMuchRecursion));
    assert_eq!(demangle(&nested_optionals(8000)), Err(Error::TooMuchRecursion));
}

#[test]
fn shared_substitutions() {
    // `AA` resolves to the module node and shares it
    let node = demangle("$S7TestMod5OuterV3Fooayx_SiGD").unwrap();
    assert_eq!(node.weight() as usize, node.tree_string().lines().count());
    assert!(node.weight() <= MAX_NODE_WEIGHT);
}

#[test]
fn invalid() {
    none!("");
    none!("main");
    none!("$s");
    none!("$sSD5IndexVy__GD");
    none!("$s18resilient_protocol24ResilientDerivedProtocolPxAA0c4BaseE0Tn");
    assert_eq!(demangle("_ZN4main3fooEv"), Err(Error::Structural));
}

#[test]
fn round_trips() {
    remangles!("$s7TestMod5OuterV3Fooayx_SiGD");
    remangles!("$S7TestMod5OuterV3Fooayx_SiGD");
    remangles!("_$S3abc6testityySiFTm");
    remangles!("_$S4main4TestC1xACSi_tc6_PRIV_Llfc");
    remangles!("$s4test3fooV4blahyAA1SV1fQryFQOy_Qo_AHF");
    remangles!("$S3nix8MystructV1xACyxGx_tcfc7MyaliasL_ayx__GD");
    remangles!("$S3nix7MyclassCfd7MyaliasL_ayx__GD");
    remangles!("$S3nix8MystructVyS2icig7MyaliasL_ayx__GD");
    remangles!("$S3nix8MystructV1x1uACyxGx_qd__tclufc7MyaliasL_ayx_qd___GD");
    remangles!("$S3nix8MystructV6testit1xyx_tF7MyaliasL_ayx__GD");
    remangles!("$S3nix8MystructV6testit1x1u1vyx_qd__qd_0_tr0_lF7MyaliasL_ayx_qd__qd_0__GD");
    remangles!("$S4blah8PatatinoaySiGD");
    remangles!("$SSiSHsWP");
    remangles!("$Ss17_VariantSetBufferO05CocoaC0ayx_GD");
    remangles!("$S2t21QP22ProtocolTypeAliasThingayAA4BlahV5SomeQa_GSgD");
    remangles!("$s1A1gyyxlFx_qd__t_Ti5");
    remangles!("$S1T19protocol_resilience17ResilientProtocolPTl");
    remangles!("$S18resilient_protocol21ResilientBaseProtocolTL");
    remangles!("$S1t1PP10AssocType2_AA1QTn");
    remangles!("$S1t1PP10AssocType2_AA1QTN");
    remangles!("$s4test3StrCACycfC");
    remangles!("$s18keypaths_inlinable13KeypathStructV8computedSSvpACTKq");
    remangles!("$s3red4testyAA3ResOyxSayq_GAEs5ErrorAAq_sAFHD1__HCg_GADyxq_GsAFR_r0_lF");
    remangles!("$s3red4testyAA7OurTypeOy4them05TheirD0Vy5AssocQzGAjE0F8ProtocolAAxAA0c7DerivedH0HD1_AA0c4BaseH0HI1_AieKHA2__HCg_GxmAaLRzlF");
    remangles!("$ss23LazyPrefixWhileSequenceVsSlRzrlEy7ElementQzABsSlRzrlE5IndexVyx_Gcig");
}

#[test]
fn bare_types() {
    let node = demangle_type("SaySiG").unwrap();
    assert_eq!(print(&node).unwrap(), "Swift.Array<Swift.Int>");
    assert_eq!(
        print_with(&node, DemangleOptions::simplified()).unwrap(),
        "[Int]"
    );
}

#[test]
fn simplified() {
    let node = demangle("$s1b1CC16funcWithCallback3fooyyyXE_tF").unwrap();
    assert_eq!(
        print_with(&node, DemangleOptions::simplified()).unwrap(),
        "C.funcWithCallback(foo:)"
    );
}

#[test]
fn deterministic() {
    let node = demangle("$s3red4testyAA3ResOyxSayq_GAEs5ErrorAAq_sAFHD1__HCg_GADyxq_GsAFR_r0_lF").unwrap();
    assert_eq!(print(&node).unwrap(), print(&node).unwrap());
    assert_eq!(node.to_string(), print(&node).unwrap());
}

#[test]
fn identifiers() {
    let encoded = crate::encode_identifier("a+!", true).unwrap();
    assert_eq!(crate::decode_identifier(&encoded).as_deref(), Some("a+!"));
    assert_eq!(crate::decode_identifier("\u{7f}"), None);
}
